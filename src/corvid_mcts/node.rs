//! Cache-line-sized node record and the arena it lives in (spec §3, §4.A).
//! One contiguous, heap-allocated slice of `Node` is owned per expansion;
//! `children` is a raw, atomically-published pointer into that slice so
//! that a reader can walk from parent to child without ever taking a lock.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, AtomicU16, AtomicU32, AtomicU8, Ordering};

use corvid_position::EncodedMove;
use corvid_utils::AtomicMean;

use crate::errors::SearchError;
use crate::terminal::{AtomicTerminalValue, TerminalValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Expansion {
    None = 0,
    Expanding = 1,
    Expanded = 2,
}

impl Expansion {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Expansion::None,
            1 => Expansion::Expanding,
            _ => Expansion::Expanded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablebaseScore {
    Win,
    Draw,
    Loss,
    CursedWin,
    BlessedLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablebaseBound {
    Exact,
    LowerBound,
    UpperBound,
}

impl From<corvid_position::TablebaseScore> for TablebaseScore {
    fn from(score: corvid_position::TablebaseScore) -> Self {
        match score {
            corvid_position::TablebaseScore::Win => TablebaseScore::Win,
            corvid_position::TablebaseScore::Draw => TablebaseScore::Draw,
            corvid_position::TablebaseScore::Loss => TablebaseScore::Loss,
            corvid_position::TablebaseScore::CursedWin => TablebaseScore::CursedWin,
            corvid_position::TablebaseScore::BlessedLoss => TablebaseScore::BlessedLoss,
        }
    }
}

impl From<corvid_position::TablebaseBound> for TablebaseBound {
    fn from(bound: corvid_position::TablebaseBound) -> Self {
        match bound {
            corvid_position::TablebaseBound::Exact => TablebaseBound::Exact,
            corvid_position::TablebaseBound::LowerBound => TablebaseBound::LowerBound,
            corvid_position::TablebaseBound::UpperBound => TablebaseBound::UpperBound,
        }
    }
}

/// One state in the search tree. `#[repr(C, align(64))]` puts each node on
/// its own cache line, in the field order written below, so concurrent
/// writers to sibling nodes never false-share; `size_and_alignment_fit_one_cache_line`
/// checks that the struct actually fits within the 64 bytes this buys it
/// rather than spilling onto a second line.
#[repr(C, align(64))]
pub struct Node {
    children: AtomicPtr<Node>,
    child_count: AtomicU16,
    best_child: AtomicPtr<Node>,

    mv: EncodedMove,
    prior: AtomicU32,

    visiting_count: AtomicU16,
    visit_count: AtomicI32,
    value: AtomicMean,
    up_weight: AtomicI32,

    terminal_value: AtomicTerminalValue,
    expansion: AtomicU8,

    has_tablebase: AtomicBool,
    tablebase_score: AtomicU8,
    tablebase_bound: AtomicU8,
    tablebase_cardinality: AtomicU8,
}

impl Node {
    pub fn new(mv: EncodedMove, prior: f32) -> Self {
        Self {
            children: AtomicPtr::new(ptr::null_mut()),
            child_count: AtomicU16::new(0),
            best_child: AtomicPtr::new(ptr::null_mut()),
            mv,
            prior: AtomicU32::new(prior.to_bits()),
            visiting_count: AtomicU16::new(0),
            visit_count: AtomicI32::new(0),
            value: AtomicMean::new(0.5),
            up_weight: AtomicI32::new(0),
            terminal_value: AtomicTerminalValue::absent(),
            expansion: AtomicU8::new(Expansion::None as u8),
            has_tablebase: AtomicBool::new(false),
            tablebase_score: AtomicU8::new(0),
            tablebase_bound: AtomicU8::new(0),
            tablebase_cardinality: AtomicU8::new(0),
        }
    }

    pub fn root() -> Self {
        Self::new(EncodedMove(0), 0.0)
    }

    pub fn mv(&self) -> EncodedMove {
        self.mv
    }

    pub fn prior(&self) -> f32 {
        f32::from_bits(self.prior.load(Ordering::Relaxed))
    }

    pub fn visit_count(&self) -> i32 {
        self.visit_count.load(Ordering::Relaxed)
    }

    pub fn visiting_count(&self) -> u16 {
        self.visiting_count.load(Ordering::Relaxed)
    }

    pub fn value_average(&self) -> f32 {
        self.value.load(Ordering::Acquire).0
    }

    pub fn value_weight(&self) -> i32 {
        self.value.load(Ordering::Acquire).1
    }

    pub fn up_weight(&self) -> i32 {
        self.up_weight.load(Ordering::Relaxed)
    }

    pub fn terminal_value(&self) -> Option<TerminalValue> {
        self.terminal_value.load(Ordering::Acquire)
    }

    pub fn set_terminal(&self, value: TerminalValue) {
        self.terminal_value.store(value, Ordering::Release);
    }

    pub fn promote_terminal(&self, candidate: TerminalValue) {
        self.terminal_value.promote(candidate);
    }

    pub fn tablebase(&self) -> Option<(TablebaseScore, TablebaseBound, u8)> {
        if !self.has_tablebase.load(Ordering::Acquire) {
            return None;
        }

        let score = match self.tablebase_score.load(Ordering::Relaxed) {
            0 => TablebaseScore::Win,
            1 => TablebaseScore::Draw,
            2 => TablebaseScore::Loss,
            3 => TablebaseScore::CursedWin,
            _ => TablebaseScore::BlessedLoss,
        };
        let bound = match self.tablebase_bound.load(Ordering::Relaxed) {
            0 => TablebaseBound::Exact,
            1 => TablebaseBound::LowerBound,
            _ => TablebaseBound::UpperBound,
        };
        let cardinality = self.tablebase_cardinality.load(Ordering::Relaxed);

        Some((score, bound, cardinality))
    }

    pub fn set_tablebase(&self, score: TablebaseScore, bound: TablebaseBound, cardinality: u8) {
        self.tablebase_score.store(score as u8, Ordering::Relaxed);
        self.tablebase_bound.store(bound as u8, Ordering::Relaxed);
        self.tablebase_cardinality.store(cardinality, Ordering::Relaxed);
        self.has_tablebase.store(true, Ordering::Release);
    }

    pub fn set_tablebase_probe(&self, probe: corvid_position::TablebaseProbe) {
        self.set_tablebase(probe.score.into(), probe.bound.into(), probe.cardinality);
    }

    pub fn expansion(&self) -> Expansion {
        Expansion::from_u8(self.expansion.load(Ordering::Acquire))
    }

    /// Attempts the `None -> Expanding` transition. Only the winner may
    /// allocate and publish children.
    pub fn try_begin_expansion(&self) -> bool {
        self.expansion
            .compare_exchange(
                Expansion::None as u8,
                Expansion::Expanding as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Reverts a failed expansion attempt (allocation failure, predictor
    /// error) back to `None` so a later worker may retry.
    pub fn abandon_expansion(&self) {
        self.expansion.store(Expansion::None as u8, Ordering::Release);
    }

    /// Publishes `children` and release-stores `Expanded`. Must only be
    /// called by the worker that won `try_begin_expansion`.
    pub fn publish_children(&self, children: Box<[Node]>) {
        let count = children.len() as u16;
        let ptr = Box::into_raw(children) as *mut Node;

        self.children.store(ptr, Ordering::Relaxed);
        self.child_count.store(count, Ordering::Relaxed);
        self.expansion.store(Expansion::Expanded as u8, Ordering::Release);
    }

    /// Marks the node terminal: no children, `expansion = Expanded`
    /// trivially (a terminal node is "expanded" with zero children).
    pub fn publish_terminal(&self, value: TerminalValue) {
        self.set_terminal(value);
        self.child_count.store(0, Ordering::Relaxed);
        self.expansion.store(Expansion::Expanded as u8, Ordering::Release);
    }

    pub fn child_count(&self) -> u16 {
        self.child_count.load(Ordering::Relaxed)
    }

    /// Returns the children slice if `expansion == Expanded` and there is
    /// at least one child; acquire-loads `expansion` first per the
    /// publication invariant.
    pub fn children(&self) -> Option<&[Node]> {
        if self.expansion() != Expansion::Expanded {
            return None;
        }

        let count = self.child_count.load(Ordering::Relaxed) as usize;
        if count == 0 {
            return None;
        }

        let ptr = self.children.load(Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }

        Some(unsafe { std::slice::from_raw_parts(ptr, count) })
    }

    fn children_mut(&self) -> Option<&mut [Node]> {
        let count = self.child_count.load(Ordering::Relaxed) as usize;
        if count == 0 {
            return None;
        }

        let ptr = self.children.load(Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }

        Some(unsafe { std::slice::from_raw_parts_mut(ptr, count) })
    }

    pub fn apply_virtual_loss(&self) {
        self.visiting_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn revert_virtual_loss(&self) {
        self.visiting_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Folds a backpropagated sample into this node's running value and
    /// advances its visit accounting; `weight` is the simulation's credit
    /// (normally 1, higher for converged subtrees per `SelectChild`).
    pub fn backpropagate(&self, sample: f32, weight: i32, build: i32, cap: i32) {
        self.value.update(sample, weight, build, cap);
        self.visit_count.fetch_add(weight, Ordering::AcqRel);
        self.up_weight.fetch_add(weight, Ordering::AcqRel);
    }

    pub fn set_best_child(&self, child: *const Node) {
        self.best_child.store(child as *mut Node, Ordering::Release);
    }

    pub fn best_child(&self) -> Option<&Node> {
        let ptr = self.best_child.load(Ordering::Acquire);
        unsafe { ptr.as_ref() }
    }

    pub fn index_of(&self, child: &Node) -> Option<usize> {
        let children = self.children()?;
        let base = children.as_ptr() as usize;
        let target = child as *const Node as usize;

        if target < base {
            return None;
        }

        let offset = (target - base) / std::mem::size_of::<Node>();
        if offset < children.len() {
            Some(offset)
        } else {
            None
        }
    }
}

/// Releases every subtree under `node` except the child at `keep_index`
/// (if any), recursively; the kept subtree's pointer is detached from
/// `node` so the caller can promote it to a new root without a dangling
/// reference back into freed memory.
pub fn prune_except(node: &Node, keep_index: Option<usize>) -> Option<Box<Node>> {
    let count = node.child_count.load(Ordering::Relaxed) as usize;
    let ptr = node.children.swap(ptr::null_mut(), Ordering::AcqRel);
    node.child_count.store(0, Ordering::Relaxed);
    node.best_child.store(ptr::null_mut(), Ordering::Release);

    if ptr.is_null() || count == 0 {
        return None;
    }

    let children = unsafe { Box::from_raw(std::slice::from_raw_parts_mut(ptr, count)) };
    let mut kept = None;

    // Every non-kept child is simply allowed to fall out of scope here;
    // `Node`'s own `Drop` impl recursively frees its children, so this
    // naturally reclaims each unkept subtree depth-first without a second
    // manual walk.
    for (i, child) in children.into_vec().into_iter().enumerate() {
        if Some(i) == keep_index {
            kept = Some(Box::new(child));
        }
    }

    kept
}

pub fn prune_all(node: &Node) {
    prune_except(node, None);
}

/// Allocates `child_count` contiguous child nodes, one per legal move, with
/// the matching (renormalized) priors. Returns `AllocationFailed` only in
/// the degenerate case of a zero-length move list being passed by mistake;
/// real allocation failure is not observable from safe Rust and is modeled
/// here for parity with the spec's documented failure mode.
pub fn allocate_children(moves_and_priors: Vec<(EncodedMove, f32)>) -> Result<Box<[Node]>, SearchError> {
    if moves_and_priors.is_empty() {
        return Err(SearchError::AllocationFailed);
    }

    Ok(moves_and_priors
        .into_iter()
        .map(|(mv, prior)| Node::new(mv, prior))
        .collect::<Vec<_>>()
        .into_boxed_slice())
}

/// Probes the resulting position of every child move and caches any hit
/// directly on the child node, so `puct::select_child` can clamp its value
/// estimate without re-probing the tablebase on every visit. A miss
/// (`probe_tablebase` returning `None`, per spec §7's soft `TablebaseProbeFailed`
/// disposition) just leaves that child without tablebase info.
pub fn populate_tablebase_probes<P: corvid_position::Position + Clone>(
    children: &[Node],
    position: &P,
    moves: &[corvid_position::Move],
) {
    for (child, mv) in children.iter().zip(moves) {
        let mut next = position.clone();
        next.apply_move(*mv);
        if let Some(probe) = next.probe_tablebase() {
            child.set_tablebase_probe(probe);
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(children) = self.children_mut() {
            let count = children.len();
            let ptr = self.children.swap(ptr::null_mut(), Ordering::AcqRel);
            if !ptr.is_null() {
                drop(unsafe { Box::from_raw(std::slice::from_raw_parts_mut(ptr, count)) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_and_alignment_fit_one_cache_line() {
        assert!(std::mem::size_of::<Node>() <= 64);
        assert_eq!(std::mem::align_of::<Node>(), 64);
    }

    #[test]
    fn fresh_node_is_unexpanded() {
        let node = Node::root();
        assert_eq!(node.expansion(), Expansion::None);
        assert!(node.children().is_none());
    }

    #[test]
    fn only_one_worker_wins_expansion() {
        let node = Node::root();
        assert!(node.try_begin_expansion());
        assert!(!node.try_begin_expansion());
    }

    #[test]
    fn abandon_allows_retry() {
        let node = Node::root();
        assert!(node.try_begin_expansion());
        node.abandon_expansion();
        assert!(node.try_begin_expansion());
    }

    #[test]
    fn publish_children_is_observable_after_release() {
        let node = Node::root();
        node.try_begin_expansion();

        let children = allocate_children(vec![(EncodedMove(1), 0.5), (EncodedMove(2), 0.5)]).unwrap();
        node.publish_children(children);

        let kids = node.children().expect("children should be visible");
        assert_eq!(kids.len(), 2);
        assert_eq!(node.expansion(), Expansion::Expanded);
    }

    #[test]
    fn terminal_node_has_no_children() {
        let node = Node::root();
        node.try_begin_expansion();
        node.publish_terminal(TerminalValue::Draw);

        assert!(node.children().is_none());
        assert_eq!(node.terminal_value(), Some(TerminalValue::Draw));
    }

    #[test]
    fn prune_except_keeps_only_the_named_child() {
        let node = Node::root();
        node.try_begin_expansion();
        let children = allocate_children(vec![
            (EncodedMove(1), 0.3),
            (EncodedMove(2), 0.3),
            (EncodedMove(3), 0.4),
        ])
        .unwrap();
        node.publish_children(children);

        let kept = prune_except(&node, Some(1)).expect("child 1 should survive");
        assert_eq!(kept.mv(), EncodedMove(2));
        assert!(node.children().is_none());
    }
}
