//! The "opaque batch predictor" named in the search spec: a capability
//! interface rather than an inheritance chain, per the design notes. This
//! crate never implements a real neural network -- the specific tensor
//! encoding of a board position is explicitly out of scope -- it only
//! defines the contract and two reference implementations used to drive
//! tests deterministically: a uniform fallback and a material-balance test
//! double.

use corvid_position::{Color, Move};

/// A single position queued for evaluation. `legal_moves` stands in for the
/// tensor encoding a real network would consume; the predictor is expected
/// to return one logit per entry, in the same order.
#[derive(Debug, Clone)]
pub struct PredictionInput {
    pub fingerprint: u64,
    pub side_to_move: Color,
    pub legal_moves: Vec<Move>,
    /// A cheap evaluation signal a real encoder would fold into its
    /// features; reference predictors use it directly so their output is a
    /// deterministic, legible function of the position.
    pub material_balance: i32,
}

#[derive(Debug, Clone)]
pub struct PredictionOutput {
    /// Scalar value in `[0, 1]` from the perspective of `side_to_move`.
    pub value: f32,
    /// Pre-softmax logits, aligned one-to-one with `PredictionInput::legal_moves`.
    pub logits: Vec<f32>,
}

/// The capability interface a batch predictor must provide. Concrete
/// implementations (a real network client, the uniform fallback, test
/// doubles) are interchangeable behind this trait -- no inheritance chain.
pub trait Predictor: Send + Sync {
    /// Number of positions this predictor expects per `predict` call; the
    /// worker group batches its in-flight games to this size.
    fn batch_size(&self) -> usize;

    /// Must be called, and allowed to complete, before the first `predict`
    /// call reaches this predictor (e.g. to load weights onto a device).
    fn warm_up(&self) {}

    fn predict(&self, batch: &[PredictionInput]) -> Vec<PredictionOutput>;
}

/// `PredictBatchUniform` from spec.md §6: returns a drawish value and a
/// uniform policy over whatever legal moves were supplied. The reference
/// predictor callers reach for when no trained network is available, e.g.
/// the demo binary and most of this crate's own tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPredictor {
    batch_size: usize,
}

impl UniformPredictor {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }
}

impl Predictor for UniformPredictor {
    fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn predict(&self, batch: &[PredictionInput]) -> Vec<PredictionOutput> {
        batch
            .iter()
            .map(|input| PredictionOutput { value: 0.5, logits: vec![0.0; input.legal_moves.len()] })
            .collect()
    }
}

/// A deterministic test double whose value is a squashed material balance
/// and whose policy favours captures slightly over quiet moves. Exists so
/// `corvid_tests`'s end-to-end scenarios are reproducible without shipping
/// real network weights.
#[derive(Debug, Clone, Copy)]
pub struct MaterialPredictor {
    batch_size: usize,
}

impl MaterialPredictor {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    fn squash(material: i32) -> f32 {
        // logistic squash so a material lead of a queen or more saturates
        // close to (but never exactly) 0 or 1.
        let x = material as f32 / 9.0;
        1.0 / (1.0 + (-x).exp())
    }
}

impl Predictor for MaterialPredictor {
    fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn predict(&self, batch: &[PredictionInput]) -> Vec<PredictionOutput> {
        batch
            .iter()
            .map(|input| PredictionOutput {
                value: Self::squash(input.material_balance),
                logits: vec![0.0; input.legal_moves.len()],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_predictor_always_reports_draw() {
        let predictor = UniformPredictor::new(4);
        let batch = vec![PredictionInput {
            fingerprint: 1,
            side_to_move: Color::White,
            legal_moves: vec![],
            material_balance: 5,
        }];

        let out = predictor.predict(&batch);
        assert_eq!(out[0].value, 0.5);
    }

    #[test]
    fn material_predictor_favors_the_side_with_more_material() {
        let predictor = MaterialPredictor::new(1);
        let ahead = predictor.predict(&[PredictionInput {
            fingerprint: 1,
            side_to_move: Color::White,
            legal_moves: vec![],
            material_balance: 9,
        }]);
        let behind = predictor.predict(&[PredictionInput {
            fingerprint: 2,
            side_to_move: Color::White,
            legal_moves: vec![],
            material_balance: -9,
        }]);

        assert!(ahead[0].value > 0.5);
        assert!(behind[0].value < 0.5);
    }
}
