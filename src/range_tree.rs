//! 到達済み整数の集合を、互いに素で隣接しない区間の二分木として保持する。
//!
//! 葉は連続区間 [first, last] をそのまま表し、内部ノードは左右の部分木を
//! 集約する（first = left.first, last = right.last, covered = 左右の和）。
//! 兄弟の区間が接触・重複した時点で必ず併合されるため、永続する兄弟の
//! 間には常に1個以上の欠番がある。
//!
//! ノードはアリーナ（`Vec`）に置き、子は添字で参照する。
//! 解放したスロットはフリーリストに戻して再利用する。

use std::fmt;
use std::io::{self, Write};
use std::ops::RangeInclusive;

use num_traits::{PrimInt, Unsigned};
use thiserror::Error;
use tracing::trace;

/// 木に格納できる値の型（符号なし整数プリミティブ）
pub trait RangeValue: PrimInt + Unsigned + fmt::Display + fmt::Debug {}

impl<T: PrimInt + Unsigned + fmt::Display + fmt::Debug> RangeValue for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug, Clone, Copy)]
struct Node<V> {
    first: V,
    last: V,
    covered: V,
    /// 部分木の高さ（葉は 0）
    height: u32,
    /// 左右の子。葉なら None（片側だけの子は存在しない）
    children: Option<(NodeId, NodeId)>,
}

/// 区間木の統計スナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats<V> {
    pub first: V,
    pub last: V,
    pub covered: V,
    /// 1 から欠番なしで到達済みの最大値
    pub proven_last: Option<V>,
    pub nodes: usize,
    pub peak_nodes: usize,
    pub max_depth: u32,
    pub height: u32,
}

/// `validate()` が検出した構造不変条件の違反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("leaf [{first}, {last}] records {covered} covered values")]
    LeafCoverage { first: u128, last: u128, covered: u128 },
    #[error("internal node [{first}, {last}] does not aggregate its children")]
    Aggregate { first: u128, last: u128 },
    #[error("siblings ending at {left_last} and starting at {right_first} are not separated by a gap")]
    SiblingsTouch { left_last: u128, right_first: u128 },
    #[error("node [{first}, {last}] records height {found}, expected {expected}")]
    Height { first: u128, last: u128, found: u32, expected: u32 },
    #[error("proven node does not reference the leaf starting at 1")]
    Proven,
}

/// 互いに素な区間の二分木
#[derive(Debug, Clone)]
pub struct RangeTree<V = u64> {
    nodes: Vec<Node<V>>,
    free: Vec<NodeId>,
    root: NodeId,
    /// first == 1 の葉への非所有参照
    proven: Option<NodeId>,
    live: usize,
    peak: usize,
    max_depth: u32,
}

#[inline]
fn next_up<V: RangeValue>(v: V) -> V {
    if v == V::max_value() { v } else { v + V::one() }
}

#[inline]
fn next_down<V: RangeValue>(v: V) -> V {
    if v == V::zero() { v } else { v - V::one() }
}

#[inline]
fn span_of<V: RangeValue>(first: V, last: V) -> V {
    last - first + V::one()
}

#[inline]
fn wide<V: RangeValue>(v: V) -> u128 {
    v.to_u128().unwrap_or(u128::MAX)
}

impl<V: RangeValue> RangeTree<V> {
    /// [first, last] を唯一の葉とする木を作る。
    pub fn new(first: V, last: V) -> Self {
        assert!(first <= last, "root range [{}, {}] is inverted", first, last);
        let mut tree = RangeTree {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
            proven: None,
            live: 0,
            peak: 0,
            max_depth: 0,
        };
        tree.root = tree.create(0, first, last);
        tree
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.0]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.0]
    }

    /// 深さ depth に葉ノードを確保する。
    fn create(&mut self, depth: u32, first: V, last: V) -> NodeId {
        trace!(depth, %first, %last, "creating");
        let node = Node {
            first,
            last,
            covered: span_of(first, last),
            height: 0,
            children: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.live += 1;
        self.peak = self.peak.max(self.live);
        self.max_depth = self.max_depth.max(depth);
        if first == V::one() {
            self.proven = Some(id);
        }
        id
    }

    /// 1ノードだけ解放する（子は呼び出し側が付け替え済み）。
    fn release(&mut self, id: NodeId) {
        let node = self.node(id);
        trace!(first = %node.first, last = %node.last, "destroying");
        self.free.push(id);
        self.live -= 1;
    }

    /// 部分木をまとめて解放する。
    fn destroy(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some((left, right)) = self.node(id).children {
                stack.push(right);
                stack.push(left);
            }
            self.release(id);
        }
    }

    /// 子から first / last / covered / height を再計算する。
    fn refresh(&mut self, id: NodeId) {
        match self.node(id).children {
            None => {
                let node = self.node_mut(id);
                node.covered = span_of(node.first, node.last);
                node.height = 0;
            }
            Some((left, right)) => {
                let l = *self.node(left);
                let r = *self.node(right);
                let node = self.node_mut(id);
                node.first = l.first;
                node.last = r.last;
                node.covered = l.covered + r.covered;
                node.height = 1 + l.height.max(r.height);
            }
        }
    }

    /// 区間 [first, last] を挿入する。
    ///
    /// 区間全体が既に記録済みなら true、新しい値を1つでも記録したら false。
    ///
    /// # Panics
    ///
    /// first > last のとき。
    pub fn insert(&mut self, first: V, last: V) -> bool {
        assert!(first <= last, "insert of inverted range [{}, {}]", first, last);
        self.insert_at(self.root, 0, first, last)
    }

    /// 単一の値を挿入する。`insert(value, value)` と同じ。
    #[inline]
    pub fn insert_value(&mut self, value: V) -> bool {
        self.insert_at(self.root, 0, value, value)
    }

    fn insert_at(&mut self, id: NodeId, depth: u32, first: V, last: V) -> bool {
        let node = *self.node(id);
        let trivial = (first == last && (first == node.first || last == node.last))
            || (node.children.is_none() && first == node.first && last == node.last);
        let found = if trivial {
            true
        } else {
            trace!(depth, %first, %last, into_first = %node.first, into_last = %node.last, "inserting");
            match node.children {
                None => self.insert_into_leaf(id, depth, first, last),
                Some((left, right)) => self.insert_into_internal(id, depth, left, right, first, last),
            }
        };
        if found {
            trace!(depth, %first, %last, "found");
        } else {
            self.refresh(id);
        }
        found
    }

    /// 葉への挿入。部分区間 / 重複・隣接（拡張）/ 左右に離れている（分割）。
    fn insert_into_leaf(&mut self, id: NodeId, depth: u32, first: V, last: V) -> bool {
        let Node { first: leaf_first, last: leaf_last, .. } = *self.node(id);

        if first >= leaf_first && last <= leaf_last {
            return true;
        }

        if first <= next_up(leaf_last) && last >= next_down(leaf_first) {
            let new_first = leaf_first.min(first);
            let new_last = leaf_last.max(last);
            trace!(depth, %leaf_first, %leaf_last, %new_first, %new_last, "expanding");
            let node = self.node_mut(id);
            node.first = new_first;
            node.last = new_last;
            node.covered = span_of(new_first, new_last);
            if new_first == V::one() {
                self.proven = Some(id);
            }
            return false;
        }

        let (left, right) = if last < next_down(leaf_first) {
            trace!(depth, %first, %last, %leaf_first, %leaf_last, "splitting");
            let left = self.create(depth + 1, first, last);
            let right = self.create(depth + 1, leaf_first, leaf_last);
            (left, right)
        } else {
            debug_assert!(first > next_up(leaf_last));
            trace!(depth, %leaf_first, %leaf_last, %first, %last, "splitting");
            let left = self.create(depth + 1, leaf_first, leaf_last);
            let right = self.create(depth + 1, first, last);
            (left, right)
        };
        self.node_mut(id).children = Some((left, right));
        self.refresh(id);
        false
    }

    /// 内部ノードへの挿入。両方の子に触れるなら併合、そうでなければ子へ降りる。
    fn insert_into_internal(
        &mut self,
        id: NodeId,
        depth: u32,
        left: NodeId,
        right: NodeId,
        first: V,
        last: V,
    ) -> bool {
        let l = *self.node(left);
        let r = *self.node(right);

        if first <= next_up(l.last) && last >= next_down(r.first) {
            self.coalesce(id, depth, left, right, first, last);
            return false;
        }

        let target = if first > next_up(l.last) && last < next_down(r.first) {
            self.lower(left, right)
        } else if last < next_down(r.first) {
            left
        } else if first > next_up(l.last) {
            right
        } else {
            unreachable!("range [{}, {}] matches no case under [{}, {}]", first, last, l.first, r.last);
        };

        let found = self.insert_at(target, depth + 1, first, last);
        if !found {
            self.refresh(id);
        }
        found
    }

    /// 兄弟の間に入る区間の行き先: 低い方の部分木（同じなら右）
    fn lower(&self, left: NodeId, right: NodeId) -> NodeId {
        if self.node(left).height < self.node(right).height { left } else { right }
    }

    /// 両方の子にまたがる区間を取り込む。
    ///
    /// 左の子からは区間に重なる・隣接する右端の葉を、右の子からは同じく左端の
    /// 葉を取り外して区間に併合する。両方の子が葉なら、このノードは和集合の
    /// 葉になる。子の内側に残る欠番はそのまま欠番として残る。
    fn coalesce(&mut self, id: NodeId, depth: u32, left: NodeId, right: NodeId, first: V, last: V) {
        let (kept_left, absorbed_first) = self.trim_back(left, next_down(first));
        let (kept_right, absorbed_last) = self.trim_front(right, next_up(last));
        let first = absorbed_first.map_or(first, |f| f.min(first));
        let last = absorbed_last.map_or(last, |l| l.max(last));
        trace!(depth, %first, %last, "coalescing");

        match (kept_left, kept_right) {
            (None, None) => {
                let node = self.node_mut(id);
                node.first = first;
                node.last = last;
                node.children = None;
                if first == V::one() {
                    self.proven = Some(id);
                }
            }
            (Some(kept), None) => {
                let leaf = self.create(depth + 1, first, last);
                self.node_mut(id).children = Some((kept, leaf));
            }
            (None, Some(kept)) => {
                let leaf = self.create(depth + 1, first, last);
                self.node_mut(id).children = Some((leaf, kept));
            }
            (Some(kl), Some(kr)) => {
                // 併合後の区間は残った左右の間に収まる
                self.node_mut(id).children = Some((kl, kr));
                let target = self.lower(kl, kr);
                let found = self.insert_at(target, depth + 1, first, last);
                debug_assert!(!found);
            }
        }
        self.refresh(id);
    }

    /// 部分木から first <= limit の葉を左端から取り除く。
    /// 残った部分木の根と、取り除いた葉の last の最大値を返す。
    fn trim_front(&mut self, id: NodeId, limit: V) -> (Option<NodeId>, Option<V>) {
        let node = *self.node(id);
        if node.first > limit {
            return (Some(id), None);
        }
        // 部分木ごと区間に重なるなら丸ごと解放
        let (left, right) = match node.children {
            Some(children) if node.last > limit => children,
            _ => {
                self.destroy(id);
                return (None, Some(node.last));
            }
        };
        let (kept_left, absorbed) = self.trim_front(left, limit);
        if let Some(kept_left) = kept_left {
            self.node_mut(id).children = Some((kept_left, right));
            self.refresh(id);
            return (Some(id), absorbed);
        }
        let (kept_right, absorbed_right) = self.trim_front(right, limit);
        self.release(id);
        (kept_right, absorbed_right.or(absorbed))
    }

    /// 部分木から last >= limit の葉を右端から取り除く。
    /// 残った部分木の根と、取り除いた葉の first の最小値を返す。
    fn trim_back(&mut self, id: NodeId, limit: V) -> (Option<NodeId>, Option<V>) {
        let node = *self.node(id);
        if node.last < limit {
            return (Some(id), None);
        }
        let (left, right) = match node.children {
            Some(children) if node.first < limit => children,
            _ => {
                self.destroy(id);
                return (None, Some(node.first));
            }
        };
        let (kept_right, absorbed) = self.trim_back(right, limit);
        if let Some(kept_right) = kept_right {
            self.node_mut(id).children = Some((left, kept_right));
            self.refresh(id);
            return (Some(id), absorbed);
        }
        let (kept_left, absorbed_left) = self.trim_back(left, limit);
        self.release(id);
        (kept_left, absorbed_left.or(absorbed))
    }

    /// value が記録済みか。O(深さ)。
    pub fn lookup(&self, value: V) -> bool {
        let mut id = self.root;
        loop {
            let node = self.node(id);
            let Some((left, right)) = node.children else {
                return value >= node.first && value <= node.last;
            };
            let (l, r) = (self.node(left), self.node(right));
            if value >= l.first && value <= l.last {
                id = left;
            } else if value >= r.first && value <= r.last {
                id = right;
            } else {
                return false;
            }
        }
    }

    pub fn first(&self) -> V {
        self.node(self.root).first
    }

    pub fn last(&self) -> V {
        self.node(self.root).last
    }

    /// 記録済みの値の総数
    pub fn covered(&self) -> V {
        self.node(self.root).covered
    }

    /// 根が張る区間の幅（last - first + 1）
    pub fn span(&self) -> V {
        span_of(self.first(), self.last())
    }

    /// 根の区間のうち記録済みの割合（%、切り捨て）
    pub fn coverage_percent(&self) -> u32 {
        let covered = wide(self.covered());
        let span = wide(self.span()).max(1);
        (covered.saturating_mul(100) / span) as u32
    }

    /// 1 から欠番なしで到達済みの最大値。1 を含まない木では None。
    pub fn proven_last(&self) -> Option<V> {
        self.proven.map(|id| self.node(id).last)
    }

    /// 現在のノード数
    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn peak_node_count(&self) -> usize {
        self.peak
    }

    /// これまでに作られたノードの最大深さ
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// 現在の木の高さ
    pub fn height(&self) -> u32 {
        self.node(self.root).height
    }

    pub fn stats(&self) -> TreeStats<V> {
        TreeStats {
            first: self.first(),
            last: self.last(),
            covered: self.covered(),
            proven_last: self.proven_last(),
            nodes: self.live,
            peak_nodes: self.peak,
            max_depth: self.max_depth,
            height: self.height(),
        }
    }

    /// 葉の区間を昇順に列挙する。
    pub fn leaves(&self) -> Leaves<'_, V> {
        Leaves { tree: self, stack: vec![self.root] }
    }

    /// 葉を1行1区間 `[first, last]` で書き出す。
    pub fn write_leaves<W: Write>(&self, mut w: W) -> io::Result<()> {
        for range in self.leaves() {
            writeln!(w, "[{}, {}]", range.start(), range.end())?;
        }
        Ok(())
    }

    /// 全ノードについて構造不変条件を検査する。
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            let Some((left, right)) = node.children else {
                if node.first > node.last || node.covered != span_of(node.first, node.last) {
                    return Err(InvariantViolation::LeafCoverage {
                        first: wide(node.first),
                        last: wide(node.last),
                        covered: wide(node.covered),
                    });
                }
                if node.height != 0 {
                    return Err(InvariantViolation::Height {
                        first: wide(node.first),
                        last: wide(node.last),
                        found: node.height,
                        expected: 0,
                    });
                }
                continue;
            };
            let (l, r) = (self.node(left), self.node(right));
            if node.first != l.first || node.last != r.last || node.covered != l.covered + r.covered {
                return Err(InvariantViolation::Aggregate {
                    first: wide(node.first),
                    last: wide(node.last),
                });
            }
            if next_up(l.last) >= r.first {
                return Err(InvariantViolation::SiblingsTouch {
                    left_last: wide(l.last),
                    right_first: wide(r.first),
                });
            }
            let expected = 1 + l.height.max(r.height);
            if node.height != expected {
                return Err(InvariantViolation::Height {
                    first: wide(node.first),
                    last: wide(node.last),
                    found: node.height,
                    expected,
                });
            }
            stack.push(right);
            stack.push(left);
        }

        if self.first() == V::one() {
            let leftmost = self.leftmost_leaf();
            match self.proven {
                Some(id) if id == leftmost && self.node(id).first == V::one() => {}
                _ => return Err(InvariantViolation::Proven),
            }
        }
        Ok(())
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut id = self.root;
        while let Some((left, _)) = self.node(id).children {
            id = left;
        }
        id
    }
}

/// `RangeTree::leaves()` のイテレータ
pub struct Leaves<'a, V> {
    tree: &'a RangeTree<V>,
    stack: Vec<NodeId>,
}

impl<V: RangeValue> Iterator for Leaves<'_, V> {
    type Item = RangeInclusive<V>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = self.tree.node(id);
            match node.children {
                None => return Some(node.first..=node.last),
                Some((left, right)) => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 根: [1,2] と {[4,4],[8,8]}。3 は両方の子に隣接するが 5..7 は未記録
    #[test]
    fn test_coalesce_does_not_swallow_inner_gaps() {
        let mut tree = RangeTree::<u64>::new(1, 2);
        assert!(!tree.insert_value(4));
        assert!(!tree.insert_value(8));
        assert!(!tree.insert_value(3));
        let leaves: Vec<_> = tree.leaves().collect();
        assert_eq!(leaves, vec![1..=4, 8..=8]);
        assert_eq!(tree.covered(), 5);
        assert!(!tree.lookup(6));
        assert_eq!(tree.proven_last(), Some(4));
        tree.validate().unwrap();
    }

    #[test]
    fn test_trim_front_promotes_sibling() {
        let mut tree = RangeTree::<u64>::new(10, 10);
        tree.insert_value(20);
        tree.insert_value(30);
        // 根の右の子 {[20],[30]} から 20 を取り外すと [30] が繰り上がる
        let (_, right) = tree.node(tree.root).children.unwrap();
        let (kept, absorbed) = tree.trim_front(right, 21);
        assert_eq!(absorbed, Some(20));
        let kept = kept.unwrap();
        assert_eq!((tree.node(kept).first, tree.node(kept).last), (30, 30));
        assert_eq!(tree.node(kept).height, 0);
    }

    #[test]
    fn test_node_count_tracks_frees() {
        let mut tree = RangeTree::<u64>::new(1, 2);
        tree.insert_value(4);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.height(), 1);
        tree.insert_value(3);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.peak_node_count(), 3);
        assert_eq!(tree.max_depth(), 1);
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_destroy_frees_whole_subtree() {
        let mut tree = RangeTree::<u64>::new(1, 2);
        for v in [10, 20, 30] {
            tree.insert_value(v);
        }
        let (_, right) = tree.node(tree.root).children.unwrap();
        let before = tree.node_count();
        tree.destroy(right);
        assert_eq!(tree.node_count(), before - 5);
    }
}
