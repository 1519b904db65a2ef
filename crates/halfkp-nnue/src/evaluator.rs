//! Position in, white-relative score out.

use halfkp_core::Position;
use tracing::debug;

use crate::config::{ExecutionContext, NetworkConfig};
use crate::error::NetworkError;
use crate::features::{FeatureVector, HalfKpCodec};
use crate::network::{Network, NetworkParameters};
use crate::score::ScoreMapper;

/// Codec, network and score mapping bundled for one configuration.
#[derive(Debug, Clone)]
pub struct Evaluator {
    codec: HalfKpCodec,
    network: Network,
    mapper: ScoreMapper,
}

impl Evaluator {
    /// Fails when `params` were built for a different input width than `config`.
    pub fn new(config: &NetworkConfig, params: NetworkParameters) -> Result<Self, NetworkError> {
        if params.input_size() != config.input_size() {
            return Err(NetworkError::shape(
                "feature_in.inputs",
                config.input_size(),
                params.input_size(),
            ));
        }
        Ok(Self {
            codec: HalfKpCodec::new(config.layout),
            network: Network::new(params),
            mapper: ScoreMapper::from_config(config),
        })
    }

    pub fn codec(&self) -> &HalfKpCodec {
        &self.codec
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn mapper(&self) -> &ScoreMapper {
        &self.mapper
    }

    /// A position can be scored only when the side to move has a king.
    pub fn is_evaluable(position: &Position) -> bool {
        position.king_square(position.side_to_move()).is_some()
    }

    /// Encode from the side to move, run the network, and map to the external scale.
    ///
    /// `None` when the side to move has no king. Its encoding is the degraded
    /// all-zero vector, which is not a position the network can score.
    pub fn evaluate(&self, position: &Position) -> Result<Option<f32>, NetworkError> {
        if !Self::is_evaluable(position) {
            debug!(?position, "side to move has no king, not evaluated");
            return Ok(None);
        }
        let features = self.codec.encode_side_to_move(position);
        let bounded = self.network.forward(&features)?;
        Ok(Some(self.mapper.to_external(bounded, position.side_to_move())))
    }

    /// [`evaluate`](Self::evaluate) for every position, one network pass over
    /// the evaluable ones. Results are in input order.
    pub fn evaluate_batch(
        &self,
        positions: &[Position],
        ctx: &ExecutionContext,
    ) -> Result<Vec<Option<f32>>, NetworkError> {
        let features: Vec<FeatureVector> = positions
            .iter()
            .filter(|p| Self::is_evaluable(p))
            .map(|p| self.codec.encode_side_to_move(p))
            .collect();
        let skipped = positions.len() - features.len();
        if skipped > 0 {
            debug!(skipped, "positions without a side-to-move king left unscored");
        }

        let mut bounded = self.network.forward_batch(&features, ctx)?.into_iter();
        Ok(positions
            .iter()
            .map(|p| {
                if !Self::is_evaluable(p) {
                    return None;
                }
                bounded
                    .next()
                    .map(|x| self.mapper.to_external(x, p.side_to_move()))
            })
            .collect())
    }
}
