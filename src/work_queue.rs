//! 反復版の探索で使う固定容量のリングバッファ。
//!
//! 空きスロットを番兵値で表さず、占有数 `len` で満杯・空を判定する。
//! バッファは生成時に一度だけ確保し、以後伸長しない。

use std::collections::TryReserveError;

use thiserror::Error;

/// `append` が満杯で拒否した要素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("work queue is full")]
pub struct QueueFull<T>(pub T);

#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    slots: Vec<Option<T>>,
    read: usize,
    write: usize,
    len: usize,
}

impl<T> WorkQueue<T> {
    /// 容量 capacity のキューを確保する。確保に失敗したらエラー。
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(WorkQueue { slots, read: 0, write: 0, len: 0 })
    }

    /// 書き込み位置に追加する。満杯なら要素をそのまま返す。
    pub fn append(&mut self, value: T) -> Result<(), QueueFull<T>> {
        if self.is_full() {
            return Err(QueueFull(value));
        }
        self.slots[self.write] = Some(value);
        self.write = (self.write + 1) % self.slots.len();
        self.len += 1;
        Ok(())
    }

    /// 読み出し位置から1つ取り出す。空なら None。
    pub fn fetch(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.read].take();
        debug_assert!(value.is_some(), "occupied slot {} is empty", self.read);
        self.read = (self.read + 1) % self.slots.len();
        self.len -= 1;
        value
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
