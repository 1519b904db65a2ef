//! Sparse first-layer accumulation.

use crate::features::FeatureVector;
use crate::network::Linear;

/// Pre-activation values of the first hidden layer for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub(crate) vals: Vec<f32>,
}

impl Accumulator {
    /// Full recompute: start from the bias, then add the weight column of every set feature.
    pub fn refresh(features: &FeatureVector, layer: &Linear) -> Self {
        let mut acc = Accumulator {
            vals: layer.bias().to_vec(),
        };
        for idx in features.active() {
            acc.add_feature(idx, layer);
        }
        acc
    }

    /// Add the contribution of feature `idx` (a piece placed).
    #[inline]
    pub fn add_feature(&mut self, idx: usize, layer: &Linear) {
        for (acc, w) in self.vals.iter_mut().zip(layer.column(idx)) {
            *acc += w;
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.vals
    }
}

#[cfg(test)]
mod tests {
    use super::Accumulator;
    use crate::features::FeatureVector;
    use crate::network::Linear;

    fn layer() -> Linear {
        // 2 outputs x 3 inputs, output-major
        Linear::new("l", 3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![0.5, -0.5]).unwrap()
    }

    #[test]
    fn refresh_sums_active_columns() {
        let features = FeatureVector::from_dense(&[1.0, 0.0, 1.0]);
        let acc = Accumulator::refresh(&features, &layer());
        assert_eq!(acc.values(), &[0.5 + 1.0 + 3.0, -0.5 + 4.0 + 6.0]);
    }

    #[test]
    fn refresh_matches_dense_product() {
        let layer = layer();
        let features = FeatureVector::from_dense(&[0.0, 1.0, 1.0]);
        let mut dense = [0.0; 2];
        layer.apply(&features.to_dense(), &mut dense);
        assert_eq!(Accumulator::refresh(&features, &layer).values(), &dense);
    }

    #[test]
    fn add_feature_extends_a_refresh() {
        let layer = layer();
        let mut acc = Accumulator::refresh(&FeatureVector::from_dense(&[1.0, 0.0, 0.0]), &layer);
        acc.add_feature(1, &layer);
        assert_eq!(acc.values(), &[0.5 + 1.0 + 2.0, -0.5 + 4.0 + 5.0]);
        assert_eq!(acc, Accumulator::refresh(&FeatureVector::from_dense(&[1.0, 1.0, 0.0]), &layer));
    }
}
