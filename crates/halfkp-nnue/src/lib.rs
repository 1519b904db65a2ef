//! HalfKP feature encoding, float evaluation network, score mapping and
//! quantized export.

pub mod accumulator;
pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod features;
pub mod network;
pub mod quantize;
pub mod sample;
pub mod score;

pub use analysis::{FeatureImportance, SpeedReport, benchmark_speed, feature_importance};
pub use config::{
    BOTTLENECK, ExecutionContext, ExportConfig, FeatureLayout, NetworkConfig, OUTPUT, Preset,
    QuantScales, QuantScheme,
};
pub use error::{CheckpointError, ConfigError, ExportError, GameResultError, NetworkError};
pub use evaluator::Evaluator;
pub use export::{BlobHeader, BlobLayout, export_to_path, export_to_writer, version_for};
pub use features::{FeatureVector, HalfKpCodec};
pub use network::{Linear, Network, NetworkParameters};
pub use quantize::{ParameterSlot, QuantizationReport, SlotReport, SlotRole};
pub use sample::TrainingSample;
pub use score::{GameResult, ScoreMapper};
