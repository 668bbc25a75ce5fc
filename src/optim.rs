use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

use crate::config::TrainConfig;

/// Supported optimizer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl OptimizerKind {
    /// Parse the config selector. Returns `None` for anything but `sgd` / `adam`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sgd" => Some(OptimizerKind::Sgd),
            "adam" => Some(OptimizerKind::Adam),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Adam => "adam",
        }
    }
}

/// Object-safe view of a burn optimizer bound to one module type.
trait ModuleStep<M, B>: Send {
    fn step_module(&mut self, lr: f64, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> ModuleStep<M, B> for O
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    fn step_module(&mut self, lr: f64, module: M, grads: GradientsParams) -> M {
        self.step(lr, module, grads)
    }
}

/// An optimizer selected from config, carrying its own learning rate.
pub struct TrainOptimizer<M, B> {
    kind: OptimizerKind,
    lr: f64,
    inner: Box<dyn ModuleStep<M, B>>,
}

impl<M, B> TrainOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    /// Apply one update; consumes the module and returns the updated one.
    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        self.inner.step_module(self.lr, module, grads)
    }
}

/// Build the optimizer named by `train.optimizer`.
///
/// `sgd` uses momentum (zero dampening, optional Nesterov) and weight decay;
/// `adam` uses burn's defaults. Any other selector yields `None`.
pub fn get_optimizer<B, M>(train: &TrainConfig) -> Option<TrainOptimizer<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let Some(kind) = OptimizerKind::from_name(&train.optimizer) else {
        tracing::warn!("unknown optimizer '{}', no optimizer created", train.optimizer);
        return None;
    };

    let inner: Box<dyn ModuleStep<M, B>> = match kind {
        OptimizerKind::Sgd => {
            let momentum = (train.momentum > 0.0).then(|| {
                MomentumConfig::new()
                    .with_momentum(train.momentum)
                    .with_dampening(0.0)
                    .with_nesterov(train.nesterov)
            });
            let weight_decay = (train.wd > 0.0).then(|| WeightDecayConfig::new(train.wd as f32));
            Box::new(
                SgdConfig::new()
                    .with_momentum(momentum)
                    .with_weight_decay(weight_decay)
                    .init::<B, M>(),
            )
        }
        OptimizerKind::Adam => Box::new(AdamConfig::new().init::<B, M>()),
    };

    tracing::info!("=> using {} optimizer (lr={})", kind.name(), train.lr);
    Some(TrainOptimizer {
        kind,
        lr: train.lr,
        inner,
    })
}
