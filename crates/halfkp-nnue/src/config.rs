//! Immutable run configuration: network shape, feature layout, quantization scheme,
//! and the execution context chosen once at startup.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::ConfigError;

/// Width of the bottleneck between the feature transformer and the output stage.
pub const BOTTLENECK: usize = 32;

/// Network output width.
pub const OUTPUT: usize = 1;

/// Squares on the board.
const SQUARES: usize = 64;

/// How feature indices are laid out in the input vector.
///
/// Both layouts use `king * king_stride + bucket * 6 * 64 + kind * 64 + square`;
/// they differ only in the king stride and therefore the input width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureLayout {
    /// King stride 0: 2 * 6 * 64 = 768 inputs. The king only anchors the
    /// perspective and its mirroring.
    #[default]
    Compact,
    /// King stride 10 * 64, input wide enough for every king square.
    KingRelative,
}

impl FeatureLayout {
    /// Multiplier applied to the perspective king square.
    #[inline]
    pub const fn king_stride(self) -> usize {
        match self {
            FeatureLayout::Compact => 0,
            FeatureLayout::KingRelative => 10 * SQUARES,
        }
    }

    /// Number of inputs the layout needs so that no index is dropped.
    pub const fn input_size(self) -> usize {
        (SQUARES - 1) * self.king_stride() + 2 * 6 * SQUARES
    }

    pub const fn name(self) -> &'static str {
        match self {
            FeatureLayout::Compact => "compact",
            FeatureLayout::KingRelative => "king-relative",
        }
    }
}

impl FromStr for FeatureLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<FeatureLayout, ConfigError> {
        match s {
            "compact" => Ok(FeatureLayout::Compact),
            "king-relative" => Ok(FeatureLayout::KingRelative),
            other => Err(ConfigError::UnknownLayout {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Network shape and score scale. Built once per run and passed by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    pub layout: FeatureLayout,
    pub hidden_size: usize,
    /// Centipawns per unit of bounded network output.
    pub eval_scale: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            layout: FeatureLayout::Compact,
            hidden_size: 256,
            eval_scale: 361.0,
        }
    }
}

impl NetworkConfig {
    /// Input width implied by the feature layout.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.layout.input_size()
    }

    /// Configuration for a named preset.
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Default | Preset::QuickTest | Preset::CpuOnly => Self::default(),
            Preset::LargeScale => Self {
                hidden_size: 512,
                ..Self::default()
            },
        }
    }

    /// Reject shapes and scales that cannot produce a meaningful network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hidden_size == 0 {
            return Err(ConfigError::ZeroHidden);
        }
        if !self.eval_scale.is_finite() || self.eval_scale <= 0.0 {
            return Err(ConfigError::InvalidEvalScale {
                value: self.eval_scale,
            });
        }
        Ok(())
    }

    /// The description written into exported artifacts by default.
    pub fn description(&self) -> String {
        format!("NNUE {}->{}->{OUTPUT}", self.input_size(), self.hidden_size)
    }
}

/// Named configurations carried over from the training presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Default,
    QuickTest,
    LargeScale,
    CpuOnly,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Default,
        Preset::QuickTest,
        Preset::LargeScale,
        Preset::CpuOnly,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::QuickTest => "quick_test",
            Preset::LargeScale => "large_scale",
            Preset::CpuOnly => "cpu_only",
        }
    }

    pub const fn summary(self) -> &'static str {
        match self {
            Preset::Default => "standard network, 256 hidden",
            Preset::QuickTest => "small smoke-test runs, 256 hidden",
            Preset::LargeScale => "wider network, 512 hidden",
            Preset::CpuOnly => "256 hidden, single-threaded evaluation",
        }
    }

    /// Execution context the preset asks for.
    pub fn execution(self) -> ExecutionContext {
        match self {
            Preset::CpuOnly => ExecutionContext::single_threaded(),
            _ => ExecutionContext::detect(),
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Preset, ConfigError> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: s.to_string(),
            })
    }
}

/// Per-role multipliers applied before narrowing to integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantScales {
    pub feature_weight: f32,
    pub feature_bias: f32,
    pub output_weight: f32,
    pub output_bias: f32,
}

impl Default for QuantScales {
    fn default() -> Self {
        QuantScheme::default().scales()
    }
}

impl QuantScales {
    /// Identity scales: every value is narrowed as-is.
    pub const UNIT: QuantScales = QuantScales {
        feature_weight: 1.0,
        feature_bias: 1.0,
        output_weight: 1.0,
        output_bias: 1.0,
    };

    /// Feature transformer x255, output stage x64, output biases x255*64.
    pub const SCALED: QuantScales = QuantScales {
        feature_weight: 255.0,
        feature_bias: 255.0,
        output_weight: 64.0,
        output_bias: 255.0 * 64.0,
    };
}

/// The fixed set of quantization schemes an artifact can be written with.
///
/// Each scheme has its own format version id in the artifact header, so a
/// reader knows which scales to divide by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantScheme {
    /// Plain cast: round and clip the float values, no scaling.
    Plain,
    /// [`QuantScales::SCALED`].
    #[default]
    Scaled,
}

impl QuantScheme {
    pub const ALL: [QuantScheme; 2] = [QuantScheme::Plain, QuantScheme::Scaled];

    pub const fn scales(self) -> QuantScales {
        match self {
            QuantScheme::Plain => QuantScales::UNIT,
            QuantScheme::Scaled => QuantScales::SCALED,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            QuantScheme::Plain => "plain",
            QuantScheme::Scaled => "scaled",
        }
    }
}

impl fmt::Display for QuantScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuantScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<QuantScheme, ConfigError> {
        QuantScheme::ALL
            .into_iter()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| ConfigError::UnknownScheme {
                name: s.to_string(),
            })
    }
}

/// Export-time settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    pub scheme: QuantScheme,
    /// Clipped fraction of a slot above which a warning is logged.
    pub clip_warn_ratio: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scheme: QuantScheme::default(),
            clip_warn_ratio: 0.01,
        }
    }
}

/// How much parallelism batch evaluation may use. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    threads: usize,
}

impl ExecutionContext {
    /// Use every core the OS reports, falling back to one thread.
    pub fn detect() -> Self {
        let threads = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self { threads }
    }

    pub const fn single_threaded() -> Self {
        Self { threads: 1 }
    }

    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    #[inline]
    pub const fn threads(&self) -> usize {
        self.threads
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionContext, FeatureLayout, NetworkConfig, Preset, QuantScales, QuantScheme};
    use crate::error::ConfigError;

    #[test]
    fn layout_input_sizes() {
        assert_eq!(FeatureLayout::Compact.input_size(), 768);
        assert_eq!(FeatureLayout::KingRelative.input_size(), 63 * 640 + 768);
    }

    #[test]
    fn default_description() {
        assert_eq!(NetworkConfig::default().description(), "NNUE 768->256->1");
    }

    #[test]
    fn presets_parse_and_validate() {
        for preset in Preset::ALL {
            assert_eq!(preset.name().parse::<Preset>().unwrap(), preset);
            NetworkConfig::preset(preset).validate().unwrap();
        }
        assert_eq!(NetworkConfig::preset(Preset::LargeScale).hidden_size, 512);
        assert!(matches!(
            "huge".parse::<Preset>(),
            Err(ConfigError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let zero = NetworkConfig {
            hidden_size: 0,
            ..NetworkConfig::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroHidden));

        for eval_scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = NetworkConfig {
                eval_scale,
                ..NetworkConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidEvalScale { .. })
            ));
        }
    }

    #[test]
    fn execution_context_has_at_least_one_thread() {
        assert!(ExecutionContext::detect().threads() >= 1);
        assert_eq!(ExecutionContext::with_threads(0).threads(), 1);
        assert_eq!(Preset::CpuOnly.execution(), ExecutionContext::single_threaded());
    }

    #[test]
    fn layout_names_roundtrip() {
        for layout in [FeatureLayout::Compact, FeatureLayout::KingRelative] {
            assert_eq!(layout.to_string().parse::<FeatureLayout>().unwrap(), layout);
        }
    }

    #[test]
    fn schemes_parse_and_map_to_scales() {
        for scheme in QuantScheme::ALL {
            assert_eq!(scheme.name().parse::<QuantScheme>().unwrap(), scheme);
        }
        assert_eq!(QuantScheme::Plain.scales(), QuantScales::UNIT);
        assert_eq!(QuantScales::default(), QuantScales::SCALED);
        assert!(matches!(
            "float".parse::<QuantScheme>(),
            Err(ConfigError::UnknownScheme { .. })
        ));
    }
}
