//! Turning a scored position into a training example.

use halfkp_core::Position;

use crate::features::{FeatureVector, HalfKpCodec};
use crate::score::{GameResult, ScoreMapper};

/// One prepared example: side-to-move features plus both targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    /// Bounded evaluation target in [-1, 1], side-to-move relative.
    pub target: f32,
    /// Game outcome for the side to move: 1.0, 0.5 or 0.0.
    pub outcome: f32,
}

impl TrainingSample {
    /// `eval_cp` is the white-relative engine evaluation of `position`.
    pub fn prepare(
        position: &Position,
        eval_cp: f32,
        result: GameResult,
        codec: &HalfKpCodec,
        mapper: &ScoreMapper,
    ) -> Self {
        let side = position.side_to_move();
        Self {
            features: codec.encode_side_to_move(position),
            target: mapper.to_training_target(eval_cp, side),
            outcome: result.outcome_for(side),
        }
    }
}
