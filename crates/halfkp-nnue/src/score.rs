//! Conversion between bounded network output and the external score scale.

use std::fmt;
use std::str::FromStr;

use halfkp_core::Color;

use crate::config::NetworkConfig;
use crate::error::GameResultError;

/// Maps the network's bounded output to centipawn-like scores and back.
///
/// Network output is from the side to move's point of view; external scores
/// are always from white's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreMapper {
    eval_scale: f32,
}

impl ScoreMapper {
    /// `eval_scale` must be finite and positive; [`NetworkConfig::validate`] checks it.
    pub const fn new(eval_scale: f32) -> Self {
        Self { eval_scale }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.eval_scale)
    }

    #[inline]
    pub const fn eval_scale(&self) -> f32 {
        self.eval_scale
    }

    /// Bounded output for `side` to move -> white-relative external score.
    #[inline]
    pub fn to_external(&self, bounded: f32, side: Color) -> f32 {
        let score = bounded * self.eval_scale;
        match side {
            Color::White => score,
            Color::Black => -score,
        }
    }

    /// White-relative external score -> bounded training target for `side` to move,
    /// clamped into [-1, 1].
    #[inline]
    pub fn to_training_target(&self, external: f32, side: Color) -> f32 {
        let target = external / self.eval_scale;
        let target = match side {
            Color::White => target,
            Color::Black => -target,
        };
        target.clamp(-1.0, 1.0)
    }
}

impl Default for ScoreMapper {
    fn default() -> Self {
        Self::from_config(&NetworkConfig::default())
    }
}

/// Final result of the game a position was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    /// 1.0 for a win, 0.0 for a loss and 0.5 for a draw, from `side`'s point of view.
    pub fn outcome_for(self, side: Color) -> f32 {
        match (self, side) {
            (GameResult::Draw, _) => 0.5,
            (GameResult::WhiteWins, Color::White) | (GameResult::BlackWins, Color::Black) => 1.0,
            _ => 0.0,
        }
    }
}

impl FromStr for GameResult {
    type Err = GameResultError;

    fn from_str(s: &str) -> Result<GameResult, GameResultError> {
        match s.trim() {
            "1-0" => Ok(GameResult::WhiteWins),
            "0-1" => Ok(GameResult::BlackWins),
            "1/2-1/2" => Ok(GameResult::Draw),
            other => Err(GameResultError {
                found: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        })
    }
}

#[cfg(test)]
mod tests {
    use halfkp_core::Color;

    use super::{GameResult, ScoreMapper};

    #[test]
    fn external_score_is_white_relative() {
        let mapper = ScoreMapper::new(400.0);
        assert_eq!(mapper.to_external(0.5, Color::White), 200.0);
        assert_eq!(mapper.to_external(0.5, Color::Black), -200.0);
        assert_eq!(mapper.to_external(0.0, Color::Black), 0.0);
    }

    #[test]
    fn training_target_clamps() {
        let mapper = ScoreMapper::new(400.0);
        assert_eq!(mapper.to_training_target(200.0, Color::White), 0.5);
        assert_eq!(mapper.to_training_target(200.0, Color::Black), -0.5);
        assert_eq!(mapper.to_training_target(10_000.0, Color::White), 1.0);
        assert_eq!(mapper.to_training_target(10_000.0, Color::Black), -1.0);
        assert_eq!(mapper.to_training_target(-1e9, Color::White), -1.0);
    }

    #[test]
    fn target_then_external_round_trips_inside_range() {
        let mapper = ScoreMapper::default();
        for side in Color::ALL {
            for x in [-0.9f32, -0.25, 0.0, 0.3, 0.75] {
                let back = mapper.to_training_target(mapper.to_external(x, side), side);
                assert!((back - x).abs() < 1e-6, "{x} came back as {back} for {side}");
            }
        }
    }

    #[test]
    fn game_result_parse_and_outcome() {
        let white: GameResult = "1-0".parse().unwrap();
        assert_eq!(white.outcome_for(Color::White), 1.0);
        assert_eq!(white.outcome_for(Color::Black), 0.0);
        let draw: GameResult = "1/2-1/2".parse().unwrap();
        assert_eq!(draw.outcome_for(Color::Black), 0.5);
        assert_eq!("0-1".parse::<GameResult>().unwrap(), GameResult::BlackWins);
        assert_eq!(GameResult::Draw.to_string(), "1/2-1/2");
        assert!("*".parse::<GameResult>().is_err());
    }
}
