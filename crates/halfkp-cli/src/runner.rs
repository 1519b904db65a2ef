//! Command execution.

use std::fs;
use std::io::Write;
use std::path::Path;

use halfkp_core::{Color, Position};
use halfkp_nnue::analysis::IMPORTANCE_SAMPLE_LIMIT;
use halfkp_nnue::{
    Evaluator, ExportConfig, FeatureLayout, FeatureVector, HalfKpCodec, NetworkConfig,
    NetworkParameters, Preset, QuantScheme, benchmark_speed, checkpoint, export_to_path,
    feature_importance, version_for,
};
use tracing::{debug, info};

use crate::command::{Command, PositionSource, USAGE};
use crate::error::CliError;

/// Run `command`, writing its report to `out`.
pub fn run<W: Write>(command: Command, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::Features { position, layout } => features(&position, layout, out),
        Command::Eval {
            snapshot,
            positions,
            preset,
        } => eval(&snapshot, &positions, preset, out),
        Command::Bench {
            snapshot,
            positions,
            preset,
            rounds,
        } => bench(&snapshot, &positions, preset, rounds, out),
        Command::Importance {
            snapshot,
            positions,
            preset,
            top,
        } => importance(&snapshot, &positions, preset, top, out),
        Command::Export {
            snapshot,
            out: dest,
            preset,
            scheme,
            description,
        } => export(&snapshot, &dest, preset, scheme, description.as_deref(), out),
        Command::Presets => presets(out),
        Command::Help => {
            writeln!(out, "{USAGE}")?;
            Ok(())
        }
    }
}

fn write_indices<W: Write>(out: &mut W, side: Color, features: &FeatureVector) -> Result<(), CliError> {
    let indices: Vec<String> = features.active().map(|i| i.to_string()).collect();
    writeln!(out, "{} ({}): {}", side.name(), features.count(), indices.join(" "))?;
    Ok(())
}

fn features<W: Write>(position: &Position, layout: FeatureLayout, out: &mut W) -> Result<(), CliError> {
    let codec = HalfKpCodec::new(layout);
    let (white, black) = codec.encode(position);
    writeln!(out, "layout {layout}, {} inputs", codec.input_size())?;
    write_indices(out, Color::White, &white)?;
    write_indices(out, Color::Black, &black)?;
    Ok(())
}

/// The positions named by `source`, in order.
fn read_positions(source: &PositionSource) -> Result<Vec<Position>, CliError> {
    let path = match source {
        PositionSource::Fen(position) => return Ok(vec![*position]),
        PositionSource::File(path) => path,
    };
    let text = fs::read_to_string(path)?;
    let positions = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|fen| {
            fen.parse().map_err(|source| CliError::InvalidFen {
                fen: fen.to_string(),
                source,
            })
        })
        .collect::<Result<Vec<Position>, CliError>>()?;
    if positions.is_empty() {
        return Err(CliError::NoPositions { path: path.clone() });
    }
    debug!(path = %path.display(), count = positions.len(), "read positions");
    Ok(positions)
}

/// Load a snapshot under `preset`'s settings and check the result.
fn load(snapshot: &Path, preset: Preset) -> Result<(NetworkConfig, NetworkParameters), CliError> {
    let base = NetworkConfig::preset(preset);
    let (config, params) = checkpoint::load(snapshot, &base)?;
    config.validate()?;
    if config.hidden_size != base.hidden_size {
        debug!(
            preset = preset.name(),
            preset_hidden = base.hidden_size,
            snapshot_hidden = config.hidden_size,
            "snapshot shape overrides preset"
        );
    }
    Ok((config, params))
}

fn evaluator(snapshot: &Path, preset: Preset) -> Result<(NetworkConfig, Evaluator), CliError> {
    let (config, params) = load(snapshot, preset)?;
    let evaluator = Evaluator::new(&config, params)?;
    Ok((config, evaluator))
}

fn eval<W: Write>(
    snapshot: &Path,
    source: &PositionSource,
    preset: Preset,
    out: &mut W,
) -> Result<(), CliError> {
    let positions = read_positions(source)?;
    let (config, evaluator) = evaluator(snapshot, preset)?;
    let scores = evaluator.evaluate_batch(&positions, &preset.execution())?;
    for score in scores {
        match score {
            Some(score) => writeln!(out, "{score:.1} (white-relative, scale {})", config.eval_scale)?,
            None => writeln!(out, "no evaluable position (side to move has no king)")?,
        }
    }
    Ok(())
}

fn bench<W: Write>(
    snapshot: &Path,
    source: &PositionSource,
    preset: Preset,
    rounds: usize,
    out: &mut W,
) -> Result<(), CliError> {
    let positions = read_positions(source)?;
    let (_, evaluator) = evaluator(snapshot, preset)?;
    let report = benchmark_speed(&evaluator, &positions, &preset.execution(), rounds)?;
    info!(
        evaluations = report.evaluations,
        speedup = report.speedup(),
        "benchmark done"
    );
    writeln!(out, "{report}")?;
    Ok(())
}

fn importance<W: Write>(
    snapshot: &Path,
    source: &PositionSource,
    preset: Preset,
    top: usize,
    out: &mut W,
) -> Result<(), CliError> {
    let positions = read_positions(source)?;
    let (_, evaluator) = evaluator(snapshot, preset)?;
    let sampled = positions
        .iter()
        .filter(|p| Evaluator::is_evaluable(p))
        .count()
        .min(IMPORTANCE_SAMPLE_LIMIT);
    writeln!(out, "analyzed {sampled} positions")?;
    for (rank, feature) in feature_importance(&evaluator, &positions, top).iter().enumerate() {
        writeln!(
            out,
            "{}. feature {}: {:.4} (mean |w| {:.4}, frequency {:.3})",
            rank + 1,
            feature.index,
            feature.score,
            feature.mean_abs_weight,
            feature.frequency
        )?;
    }
    Ok(())
}

fn export<W: Write>(
    snapshot: &Path,
    dest: &Path,
    preset: Preset,
    scheme: QuantScheme,
    description: Option<&str>,
    out: &mut W,
) -> Result<(), CliError> {
    let (config, params) = load(snapshot, preset)?;
    let description = description.map_or_else(|| config.description(), str::to_string);
    info!(
        snapshot = %snapshot.display(),
        dest = %dest.display(),
        %description,
        %scheme,
        "exporting"
    );
    let export = ExportConfig {
        scheme,
        ..ExportConfig::default()
    };
    let report = export_to_path(&params, &description, &export, dest)?;
    writeln!(out, "wrote {}", dest.display())?;
    writeln!(out, "scheme {scheme}, version {:#010x}", version_for(scheme))?;
    writeln!(out, "{report}")?;
    Ok(())
}

fn presets<W: Write>(out: &mut W) -> Result<(), CliError> {
    for preset in Preset::ALL {
        let config = NetworkConfig::preset(preset);
        writeln!(
            out,
            "{:<12} {:<8} threads={} {}",
            preset.name(),
            config.description(),
            preset.execution().threads(),
            preset.summary()
        )?;
    }
    Ok(())
}
