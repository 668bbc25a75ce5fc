use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::config::ModelConfig;

const DEFAULT_HIDDEN: usize = 256;

/// Keypoint regression head.
///
/// ```text
/// Input:  [batch, feature_dim]
/// FC1:    feature_dim -> hidden, ReLU
/// FC2:    hidden -> num_joints * 2   (x, y per joint)
/// ```
#[derive(Module, Debug)]
pub struct KeypointRegressor<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct KeypointRegressorConfig {
    pub feature_dim: usize,
    pub hidden: usize,
    pub num_joints: usize,
}

impl KeypointRegressorConfig {
    /// Hidden width follows the first deconv layer, 256 when there is none.
    pub fn from_model_config(model: &ModelConfig) -> Self {
        let hidden = model
            .extra
            .num_deconv_filters
            .first()
            .copied()
            .filter(|&f| f > 0)
            .unwrap_or(DEFAULT_HIDDEN);
        KeypointRegressorConfig::new(model.feature_dim, hidden, model.num_joints)
    }

    pub fn output_dim(&self) -> usize {
        self.num_joints * 2
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> KeypointRegressor<B> {
        KeypointRegressor {
            fc1: LinearConfig::new(self.feature_dim, self.hidden).init(device),
            fc2: LinearConfig::new(self.hidden, self.output_dim()).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> KeypointRegressor<B> {
    /// Forward pass: input [batch, feature_dim] -> output [batch, num_joints * 2].
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(input));
        self.fc2.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let config = KeypointRegressorConfig::new(8, 16, 17);
        let network = config.init::<TestBackend>(&device);

        let input = Tensor::zeros([2, 8], &device);
        let output = network.forward(input);
        assert_eq!(output.shape().dims, [2, 34]);
    }

    #[test]
    fn test_hidden_width_from_deconv_filters() {
        let mut model = ModelConfig::default();
        model.extra.num_deconv_filters = vec![128, 64];
        let config = KeypointRegressorConfig::from_model_config(&model);
        assert_eq!(config.hidden, 128);
        assert_eq!(config.feature_dim, 64);
        assert_eq!(config.output_dim(), 34);
    }

    #[test]
    fn test_hidden_width_default_without_deconv() {
        let mut model = ModelConfig::default();
        model.extra.num_deconv_filters.clear();
        let config = KeypointRegressorConfig::from_model_config(&model);
        assert_eq!(config.hidden, 256);
    }
}
