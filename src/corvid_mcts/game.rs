//! `SelfPlayGame`: one in-flight simulation (spec §4.E). Reimplemented as an
//! explicit state machine rather than a coroutine, per design note -- the
//! worker's tick inspects `phase` and resumes at the right point once the
//! predictor batch returns.

use corvid_position::{Move, Position};
use corvid_predictor::PredictionInput;

use crate::node::Node;

/// A step recorded while descending so backpropagation can walk back up
/// without re-deriving the path from the position. Nodes are addressed by
/// raw pointer rather than index or parent reference (spec §9: "do not
/// store parent pointers"); this is sound because pruning only ever runs
/// while every worker is parked at the barrier, so no path a worker is
/// actively holding is ever freed out from under it.
#[derive(Debug, Clone, Copy)]
pub struct PathStep {
    pub node: *const Node,
}

/// The suspendable state of a leaf awaiting a predictor response. Carries
/// everything `ExpandAndEvaluate` needs to resume: the fingerprint it
/// reserved a cache slot for, the legal moves enumerated before suspending,
/// and the cache reservation handle's chunk/slot coordinates (opaque here;
/// owned by the worker, which holds the actual `ReservationHandle`).
#[derive(Debug, Clone)]
pub struct PendingExpansion {
    pub fingerprint: u64,
    pub legal_moves: Vec<Move>,
    pub material_balance: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Working,
    WaitingForPrediction,
    Finished,
}

pub struct SelfPlayGame<P: Position> {
    pub phase: Phase,
    pub position: P,
    pub path: Vec<PathStep>,
    pub pending: Option<PendingExpansion>,
    simulations_run: u32,
}

impl<P: Position> SelfPlayGame<P> {
    pub fn new(position: P) -> Self {
        Self { phase: Phase::Working, position, path: Vec::new(), pending: None, simulations_run: 0 }
    }

    pub fn reset_for_next_simulation(&mut self, fresh_position: P) {
        self.phase = Phase::Working;
        self.position = fresh_position;
        self.path.clear();
        self.pending = None;
    }

    pub fn record_step(&mut self, node: *const Node) {
        self.path.push(PathStep { node });
    }

    pub fn suspend(&mut self, pending: PendingExpansion) {
        self.pending = Some(pending);
        self.phase = Phase::WaitingForPrediction;
    }

    pub fn resume(&mut self) -> PendingExpansion {
        self.phase = Phase::Working;
        self.pending.take().expect("resume called without a pending expansion")
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.simulations_run += 1;
    }

    pub fn simulations_run(&self) -> u32 {
        self.simulations_run
    }

    pub fn prediction_input(&self, fingerprint: u64, legal_moves: Vec<Move>, material_balance: i32) -> PredictionInput {
        PredictionInput {
            fingerprint,
            side_to_move: self.position.side_to_move(),
            legal_moves,
            material_balance,
        }
    }
}

/// Deterministic argmax softmax-friendly logit-to-prior mapping used during
/// expansion: illegal-move logits are masked to `-inf` by construction
/// (the predictor only ever receives the legal move list), so softmax here
/// never needs an explicit legality mask.
pub fn softmax_priors(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    if sum < 1e-6 {
        let uniform = 1.0 / logits.len() as f32;
        vec![uniform; logits.len()]
    } else {
        exps.into_iter().map(|e| e / sum).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_position::Board;

    #[test]
    fn fresh_game_starts_working() {
        let game = SelfPlayGame::new(Board::starting_position());
        assert_eq!(game.phase, Phase::Working);
        assert!(game.path.is_empty());
    }

    #[test]
    fn suspend_then_resume_round_trips_pending_state() {
        let mut game = SelfPlayGame::new(Board::starting_position());
        game.suspend(PendingExpansion { fingerprint: 7, legal_moves: vec![], material_balance: 0 });
        assert_eq!(game.phase, Phase::WaitingForPrediction);

        let pending = game.resume();
        assert_eq!(pending.fingerprint, 7);
        assert_eq!(game.phase, Phase::Working);
        assert!(game.pending.is_none());
    }

    #[test]
    fn softmax_sums_to_one() {
        let priors = softmax_priors(&[1.0, 2.0, 0.5]);
        let sum: f32 = priors.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn softmax_of_empty_logits_is_empty() {
        assert!(softmax_priors(&[]).is_empty());
    }
}
