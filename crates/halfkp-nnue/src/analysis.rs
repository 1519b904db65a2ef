//! Throughput measurement and first-layer feature importance.

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

use halfkp_core::Position;
use tracing::debug;

use crate::config::ExecutionContext;
use crate::error::NetworkError;
use crate::evaluator::Evaluator;
use crate::features::FeatureVector;
use crate::network::Linear;

/// At most this many positions feed [`feature_importance`].
pub const IMPORTANCE_SAMPLE_LIMIT: usize = 1000;

/// Timings of one [`benchmark_speed`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedReport {
    /// Evaluations timed in each mode.
    pub evaluations: usize,
    pub threads: usize,
    /// One `evaluate` call per position, encoding included.
    pub single: Duration,
    /// `forward_batch` over pre-encoded positions.
    pub batch: Duration,
}

fn per_second(count: usize, elapsed: Duration) -> f64 {
    count as f64 / elapsed.as_secs_f64().max(1e-9)
}

impl SpeedReport {
    pub fn single_per_sec(&self) -> f64 {
        per_second(self.evaluations, self.single)
    }

    pub fn batch_per_sec(&self) -> f64 {
        per_second(self.evaluations, self.batch)
    }

    /// Single time over batch time.
    pub fn speedup(&self) -> f64 {
        self.single.as_secs_f64() / self.batch.as_secs_f64().max(1e-9)
    }
}

impl fmt::Display for SpeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evaluations: {}, threads: {}", self.evaluations, self.threads)?;
        writeln!(
            f,
            "single: {:.0} evals/s ({:.3} s)",
            self.single_per_sec(),
            self.single.as_secs_f64()
        )?;
        writeln!(
            f,
            "batch:  {:.0} evals/s ({:.3} s)",
            self.batch_per_sec(),
            self.batch.as_secs_f64()
        )?;
        write!(f, "speedup: {:.1}x", self.speedup())
    }
}

/// Time single and batched evaluation over the evaluable `positions`, each
/// pass repeated `rounds` times.
pub fn benchmark_speed(
    evaluator: &Evaluator,
    positions: &[Position],
    ctx: &ExecutionContext,
    rounds: usize,
) -> Result<SpeedReport, NetworkError> {
    let positions: Vec<&Position> = positions
        .iter()
        .filter(|p| Evaluator::is_evaluable(p))
        .collect();
    let rounds = rounds.max(1);

    let start = Instant::now();
    for _ in 0..rounds {
        for position in &positions {
            evaluator.evaluate(position)?;
        }
    }
    let single = start.elapsed();

    let features: Vec<FeatureVector> = positions
        .iter()
        .map(|p| evaluator.codec().encode_side_to_move(p))
        .collect();
    let start = Instant::now();
    for _ in 0..rounds {
        evaluator.network().forward_batch(&features, ctx)?;
    }
    let batch = start.elapsed();

    let report = SpeedReport {
        evaluations: positions.len() * rounds,
        threads: ctx.threads(),
        single,
        batch,
    };
    debug!(
        evaluations = report.evaluations,
        single_per_sec = report.single_per_sec(),
        batch_per_sec = report.batch_per_sec(),
        "benchmark finished"
    );
    Ok(report)
}

/// How much one input feature matters to the first layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureImportance {
    pub index: usize,
    /// Mean absolute weight from this input to every first-layer output.
    pub mean_abs_weight: f32,
    /// Fraction of the sampled encodings with this feature set.
    pub frequency: f32,
    /// `mean_abs_weight * frequency`.
    pub score: f32,
}

/// Mean of `|w|` over the column of `layer` fed by input `index`.
pub fn mean_abs_weight(layer: &Linear, index: usize) -> f32 {
    if layer.outputs() == 0 {
        return 0.0;
    }
    layer.column(index).map(|w| w.abs()).sum::<f32>() / layer.outputs() as f32
}

/// Rank input features by `mean |first-layer weight| * activation frequency`.
///
/// Samples are the side-to-move encodings of the first
/// [`IMPORTANCE_SAMPLE_LIMIT`] evaluable positions. Features never set in the
/// sample score zero and are left out. Returns at most `top` entries, highest
/// score first, ties by ascending index.
pub fn feature_importance(evaluator: &Evaluator, positions: &[Position], top: usize) -> Vec<FeatureImportance> {
    let samples: Vec<FeatureVector> = positions
        .iter()
        .filter(|p| Evaluator::is_evaluable(p))
        .take(IMPORTANCE_SAMPLE_LIMIT)
        .map(|p| evaluator.codec().encode_side_to_move(p))
        .collect();
    if samples.is_empty() {
        return Vec::new();
    }

    let layer = evaluator.network().parameters().feature_in();
    let mut counts = vec![0u32; layer.inputs()];
    for features in &samples {
        for index in features.active() {
            counts[index] += 1;
        }
    }

    let mut ranked: Vec<FeatureImportance> = counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(index, &count)| {
            let mean_abs_weight = mean_abs_weight(layer, index);
            let frequency = count as f32 / samples.len() as f32;
            FeatureImportance {
                index,
                mean_abs_weight,
                frequency,
                score: mean_abs_weight * frequency,
            }
        })
        .collect();
    ranked.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.index.cmp(&b.index),
        order => order,
    });
    ranked.truncate(top);
    debug!(samples = samples.len(), ranked = ranked.len(), "feature importance");
    ranked
}
