//! Float network parameters and the forward pass.

use tracing::debug;

use crate::accumulator::Accumulator;
use crate::config::{BOTTLENECK, ExecutionContext, NetworkConfig, OUTPUT};
use crate::error::NetworkError;
use crate::features::FeatureVector;
use crate::quantize::{ParameterSlot, SlotRole};

/// Dense affine layer. `weights` is output-major: row `o` holds the
/// `inputs` weights feeding output `o`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    /// Build a layer, checking both tensors against `inputs x outputs`.
    /// `name` only labels the error.
    pub fn new(
        name: &str,
        inputs: usize,
        outputs: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, NetworkError> {
        if weights.len() != inputs * outputs {
            return Err(NetworkError::shape(
                format!("{name}.weights"),
                inputs * outputs,
                weights.len(),
            ));
        }
        if bias.len() != outputs {
            return Err(NetworkError::shape(format!("{name}.bias"), outputs, bias.len()));
        }
        Ok(Self {
            inputs,
            outputs,
            weights,
            bias,
        })
    }

    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            bias: vec![0.0; outputs],
        }
    }

    #[inline]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Weights from input `idx` to every output, in output order.
    #[inline]
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &f32> + '_ {
        debug_assert!(idx < self.inputs);
        self.weights.iter().skip(idx).step_by(self.inputs.max(1))
    }

    /// `out = W * input + b`.
    pub fn apply(&self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), self.inputs);
        debug_assert_eq!(out.len(), self.outputs);
        for ((o, row), b) in out
            .iter_mut()
            .zip(self.weights.chunks_exact(self.inputs.max(1)))
            .zip(&self.bias)
        {
            let sum: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
            *o = sum + b;
        }
    }

    fn check(&self, name: &str, inputs: usize, outputs: usize) -> Result<(), NetworkError> {
        if self.inputs != inputs || self.outputs != outputs {
            return Err(NetworkError::shape(
                format!("{name}.weights"),
                inputs * outputs,
                self.inputs * self.outputs,
            ));
        }
        Ok(())
    }
}

/// Every learned tensor of the network, in forward order.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkParameters {
    feature_in: Linear,
    feature_out: Linear,
    hidden: Linear,
    output: Linear,
}

impl NetworkParameters {
    /// Layer names in forward order.
    pub const LAYERS: [&'static str; 4] = ["feature_in", "feature_out", "hidden", "output"];

    /// Assemble parameters, rejecting any layer whose shape differs from
    /// `input -> hidden -> 32 -> 32 -> 1`.
    pub fn new(
        config: &NetworkConfig,
        feature_in: Linear,
        feature_out: Linear,
        hidden: Linear,
        output: Linear,
    ) -> Result<Self, NetworkError> {
        let hidden_size = config.hidden_size;
        feature_in.check("feature_in", config.input_size(), hidden_size)?;
        feature_out.check("feature_out", hidden_size, BOTTLENECK)?;
        hidden.check("hidden", BOTTLENECK, BOTTLENECK)?;
        output.check("output", BOTTLENECK, OUTPUT)?;
        Ok(Self {
            feature_in,
            feature_out,
            hidden,
            output,
        })
    }

    /// All-zero parameters for `config`.
    pub fn zeros(config: &NetworkConfig) -> Self {
        Self {
            feature_in: Linear::zeros(config.input_size(), config.hidden_size),
            feature_out: Linear::zeros(config.hidden_size, BOTTLENECK),
            hidden: Linear::zeros(BOTTLENECK, BOTTLENECK),
            output: Linear::zeros(BOTTLENECK, OUTPUT),
        }
    }

    /// Parameters for `config` with every value drawn from `fill`, in slot order.
    pub fn from_fn(config: &NetworkConfig, mut fill: impl FnMut() -> f32) -> Self {
        let mut params = Self::zeros(config);
        for layer in [
            &mut params.feature_in,
            &mut params.feature_out,
            &mut params.hidden,
            &mut params.output,
        ] {
            layer.weights.iter_mut().for_each(|w| *w = fill());
            layer.bias.iter_mut().for_each(|b| *b = fill());
        }
        params
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.feature_in.inputs
    }

    #[inline]
    pub fn hidden_size(&self) -> usize {
        self.feature_in.outputs
    }

    pub fn feature_in(&self) -> &Linear {
        &self.feature_in
    }

    pub fn feature_out(&self) -> &Linear {
        &self.feature_out
    }

    pub fn hidden(&self) -> &Linear {
        &self.hidden
    }

    pub fn output(&self) -> &Linear {
        &self.output
    }

    /// The fixed, ordered list of tensors that make up an artifact.
    pub fn slots(&self) -> [ParameterSlot<'_>; 8] {
        let (fi, fo, h, o) = (&self.feature_in, &self.feature_out, &self.hidden, &self.output);
        let [n_fi, n_fo, n_h, n_o] = Self::LAYERS;
        [
            ParameterSlot::new(n_fi, SlotRole::FeatureWeight, &fi.weights),
            ParameterSlot::new(n_fi, SlotRole::FeatureBias, &fi.bias),
            ParameterSlot::new(n_fo, SlotRole::OutputWeight, &fo.weights),
            ParameterSlot::new(n_fo, SlotRole::OutputBias, &fo.bias),
            ParameterSlot::new(n_h, SlotRole::OutputWeight, &h.weights),
            ParameterSlot::new(n_h, SlotRole::OutputBias, &h.bias),
            ParameterSlot::new(n_o, SlotRole::OutputWeight, &o.weights),
            ParameterSlot::new(n_o, SlotRole::OutputBias, &o.bias),
        ]
    }
}

#[inline]
fn relu(x: f32) -> f32 {
    x.max(0.0)
}

/// A network ready for evaluation. Immutable, so it can be shared across threads.
#[derive(Debug, Clone)]
pub struct Network {
    params: NetworkParameters,
}

impl Network {
    pub fn new(params: NetworkParameters) -> Self {
        Self { params }
    }

    pub fn parameters(&self) -> &NetworkParameters {
        &self.params
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.params.input_size()
    }

    /// Evaluate one feature vector. The result is a `tanh` output in [-1, 1].
    pub fn forward(&self, features: &FeatureVector) -> Result<f32, NetworkError> {
        self.check_input(features)?;
        Ok(self.propagate(features))
    }

    /// Evaluate many vectors, split across `ctx.threads()` scoped threads.
    ///
    /// Each sample goes through the same path as [`Network::forward`], so the
    /// results are bit-identical to evaluating one at a time. A single bad
    /// vector fails the whole batch before any work starts.
    pub fn forward_batch(
        &self,
        batch: &[FeatureVector],
        ctx: &ExecutionContext,
    ) -> Result<Vec<f32>, NetworkError> {
        for features in batch {
            self.check_input(features)?;
        }

        let mut out = vec![0.0; batch.len()];
        let threads = ctx.threads().min(batch.len());
        if threads <= 1 {
            for (o, features) in out.iter_mut().zip(batch) {
                *o = self.propagate(features);
            }
            return Ok(out);
        }

        let chunk = batch.len().div_ceil(threads);
        debug!(samples = batch.len(), threads, chunk, "batch forward");
        std::thread::scope(|s| {
            for (outs, inputs) in out.chunks_mut(chunk).zip(batch.chunks(chunk)) {
                s.spawn(move || {
                    for (o, features) in outs.iter_mut().zip(inputs) {
                        *o = self.propagate(features);
                    }
                });
            }
        });
        Ok(out)
    }

    fn check_input(&self, features: &FeatureVector) -> Result<(), NetworkError> {
        if features.len() != self.input_size() {
            return Err(NetworkError::shape(
                "features",
                self.input_size(),
                features.len(),
            ));
        }
        Ok(())
    }

    /// Forward pass on a vector of the right length.
    fn propagate(&self, features: &FeatureVector) -> f32 {
        let p = &self.params;

        let mut hidden = Accumulator::refresh(features, &p.feature_in).vals;
        hidden.iter_mut().for_each(|h| *h = relu(*h));

        let mut z = [0.0; BOTTLENECK];
        p.feature_out.apply(&hidden, &mut z);
        z.iter_mut().for_each(|v| *v = relu(*v));

        let mut y = [0.0; BOTTLENECK];
        p.hidden.apply(&z, &mut y);
        y.iter_mut().for_each(|v| *v = relu(*v));

        let mut out = [0.0; OUTPUT];
        p.output.apply(&y, &mut out);
        out[0].tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::{Linear, Network, NetworkParameters};
    use crate::config::{BOTTLENECK, ExecutionContext, NetworkConfig};
    use crate::error::NetworkError;
    use crate::features::FeatureVector;

    fn small() -> NetworkConfig {
        NetworkConfig {
            hidden_size: 8,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn linear_rejects_wrong_lengths() {
        let err = Linear::new("hidden", 32, 32, vec![0.0; 1023], vec![0.0; 32]).unwrap_err();
        assert_eq!(err, NetworkError::shape("hidden.weights", 1024, 1023));
        let err = Linear::new("output", 32, 1, vec![0.0; 32], vec![0.0; 2]).unwrap_err();
        assert_eq!(err, NetworkError::shape("output.bias", 1, 2));
    }

    #[test]
    fn parameters_reject_wrong_layer_shapes() {
        let config = small();
        let err = NetworkParameters::new(
            &config,
            Linear::zeros(768, 8),
            Linear::zeros(8, BOTTLENECK),
            Linear::zeros(BOTTLENECK, 16),
            Linear::zeros(BOTTLENECK, 1),
        )
        .unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { ref tensor, .. } if tensor == "hidden.weights"));

        NetworkParameters::new(
            &config,
            Linear::zeros(768, 8),
            Linear::zeros(8, BOTTLENECK),
            Linear::zeros(BOTTLENECK, BOTTLENECK),
            Linear::zeros(BOTTLENECK, 1),
        )
        .unwrap();
    }

    #[test]
    fn zero_network_evaluates_to_zero() {
        let net = Network::new(NetworkParameters::zeros(&small()));
        let mut x = FeatureVector::zeros(768);
        x.set(10);
        assert_eq!(net.forward(&x).unwrap(), 0.0);
    }

    #[test]
    fn output_bias_passes_through_tanh() {
        let config = small();
        let p = NetworkParameters::zeros(&config);
        let output = Linear::new("output", BOTTLENECK, 1, vec![0.0; BOTTLENECK], vec![0.5]).unwrap();
        let p = NetworkParameters::new(
            &config,
            p.feature_in().clone(),
            p.feature_out().clone(),
            p.hidden().clone(),
            output,
        )
        .unwrap();
        let net = Network::new(p);
        let y = net.forward(&FeatureVector::zeros(768)).unwrap();
        assert_eq!(y, 0.5f32.tanh());
    }

    #[test]
    fn output_is_bounded_by_tanh() {
        let net = Network::new(NetworkParameters::from_fn(&small(), || 1.0));
        let mut x = FeatureVector::zeros(768);
        x.set(0);
        let y = net.forward(&x).unwrap();
        assert!(y <= 1.0 && y > 0.99);
        let net = Network::new(NetworkParameters::from_fn(&small(), || 0.01));
        let y = net.forward(&x).unwrap();
        assert!(y > -1.0 && y < 1.0);
    }

    #[test]
    fn wrong_feature_length_is_shape_mismatch() {
        let net = Network::new(NetworkParameters::zeros(&small()));
        let err = net.forward(&FeatureVector::zeros(767)).unwrap_err();
        assert_eq!(err, NetworkError::shape("features", 768, 767));

        let batch = vec![FeatureVector::zeros(768), FeatureVector::zeros(100)];
        assert!(net.forward_batch(&batch, &ExecutionContext::with_threads(4)).is_err());
    }

    #[test]
    fn empty_batch_is_empty() {
        let net = Network::new(NetworkParameters::zeros(&small()));
        let out = net.forward_batch(&[], &ExecutionContext::with_threads(4)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn slots_are_in_fixed_order() {
        let p = NetworkParameters::zeros(&small());
        let names: Vec<String> = p.slots().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "feature_in.weights",
                "feature_in.bias",
                "feature_out.weights",
                "feature_out.bias",
                "hidden.weights",
                "hidden.bias",
                "output.weights",
                "output.bias",
            ]
        );
        assert_eq!(p.slots()[0].values.len(), 768 * 8);
    }
}
