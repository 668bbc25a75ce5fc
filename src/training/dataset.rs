use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded (features, normalized joint coordinates) pairs.
///
/// Targets are `tanh(W x)` for a fixed random projection `W`, so the train and
/// valid splits produced by [`SyntheticKeypoints::split`] share one mapping.
pub struct SyntheticKeypoints {
    features: Vec<f32>,
    targets: Vec<f32>,
    feature_dim: usize,
    target_dim: usize,
}

impl SyntheticKeypoints {
    /// Generate train and valid sets drawn from the same projection.
    pub fn split(
        feature_dim: usize,
        target_dim: usize,
        train_len: usize,
        valid_len: usize,
        seed: u64,
    ) -> (Self, Self) {
        let mut rng = StdRng::seed_from_u64(seed);
        let projection: Vec<f32> = (0..feature_dim * target_dim)
            .map(|_| rng.random_range(-1.0f32..1.0) / (feature_dim as f32).sqrt())
            .collect();

        let train = Self::sample(&mut rng, &projection, feature_dim, target_dim, train_len);
        let valid = Self::sample(&mut rng, &projection, feature_dim, target_dim, valid_len);
        (train, valid)
    }

    fn sample(
        rng: &mut StdRng,
        projection: &[f32],
        feature_dim: usize,
        target_dim: usize,
        len: usize,
    ) -> Self {
        let features: Vec<f32> = (0..len * feature_dim)
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect();

        let mut targets = Vec::with_capacity(len * target_dim);
        for x in features.chunks(feature_dim) {
            for t in 0..target_dim {
                let dot: f32 = x
                    .iter()
                    .enumerate()
                    .map(|(f, &v)| v * projection[f * target_dim + t])
                    .sum();
                targets.push(dot.tanh());
            }
        }

        SyntheticKeypoints {
            features,
            targets,
            feature_dim,
            target_dim,
        }
    }

    pub fn len(&self) -> usize {
        if self.feature_dim == 0 {
            return 0;
        }
        self.features.len() / self.feature_dim
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size)
    }

    /// Samples `start..end` as `([n, feature_dim], [n, target_dim])` tensors.
    pub fn batch<B: Backend>(
        &self,
        start: usize,
        end: usize,
        device: &B::Device,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let n = end - start;
        let features = self.features[start * self.feature_dim..end * self.feature_dim].to_vec();
        let targets = self.targets[start * self.target_dim..end * self.target_dim].to_vec();
        (
            Tensor::from_data(TensorData::new(features, [n, self.feature_dim]), device),
            Tensor::from_data(TensorData::new(targets, [n, self.target_dim]), device),
        )
    }
}
