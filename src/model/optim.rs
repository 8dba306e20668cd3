//! Optimizer parameter groups with per-group learning rates.
//!
//! The model fine-tunes with one Adam group per component: the pretrained
//! encoder at the base learning rate, and the pooling gate (when attention
//! pooling is active) and prediction head at the base rate scaled by
//! `lr_scale`. A single backward pass feeds every group; per-component
//! gradients are split out of it before each step.

use burn::{
    nn::Linear,
    optim::{
        adaptor::OptimizerAdaptor, decay::WeightDecayConfig, Adam, AdamConfig, GradientsParams,
        Optimizer,
    },
    tensor::backend::AutodiffBackend,
};

use crate::model::gnn::{AttentionPooling, GnnEncoder, GraphPropertyNet};

type AdamOptimizer<M, B> =
    OptimizerAdaptor<Adam<<B as AutodiffBackend>::InnerBackend>, M, B>;

/// Per-component Adam optimizers, each carrying its own learning rate.
pub struct ParamGroups<B: AutodiffBackend> {
    encoder: AdamOptimizer<GnnEncoder<B>, B>,
    encoder_lr: f64,
    pool: Option<AdamOptimizer<AttentionPooling<B>, B>>,
    pool_lr: f64,
    head: AdamOptimizer<Linear<B>, B>,
    head_lr: f64,
}

impl<B: AutodiffBackend> ParamGroups<B> {
    /// Build one group per component present on `model`.
    pub fn for_model(
        model: &GraphPropertyNet<B>,
        learning_rate: f64,
        lr_scale: f64,
        weight_decay: f64,
    ) -> Self {
        let adam = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(weight_decay)));
        let scaled = learning_rate * lr_scale;

        Self {
            encoder: adam.init(),
            encoder_lr: learning_rate,
            pool: model.pool.as_ref().map(|_| adam.init()),
            pool_lr: scaled,
            head: adam.init(),
            head_lr: scaled,
        }
    }

    /// Apply one optimizer step to every group from a single backward pass.
    pub fn step(
        &mut self,
        mut gradients: <B as AutodiffBackend>::Gradients,
        mut model: GraphPropertyNet<B>,
    ) -> GraphPropertyNet<B> {
        let encoder_grads = GradientsParams::from_module(&mut gradients, &model.encoder);
        model.encoder = self
            .encoder
            .step(self.encoder_lr, model.encoder, encoder_grads);

        if let Some(pool) = model.pool.take() {
            model.pool = Some(match self.pool.as_mut() {
                Some(optimizer) => {
                    let pool_grads = GradientsParams::from_module(&mut gradients, &pool);
                    optimizer.step(self.pool_lr, pool, pool_grads)
                }
                None => pool,
            });
        }

        let head_grads = GradientsParams::from_module(&mut gradients, &model.head);
        model.head = self.head.step(self.head_lr, model.head, head_grads);

        model
    }

    /// Number of active parameter groups.
    pub fn group_count(&self) -> usize {
        2 + usize::from(self.pool.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrainingBackend;
    use crate::model::config::{GraphPooling, PretrainedGnnConfig, PretrainedVariant};

    fn small_config() -> PretrainedGnnConfig {
        let mut config = PretrainedGnnConfig::new(PretrainedVariant::ContextPred);
        config.embedding_width = 4;
        config.num_layers = 1;
        config
    }

    #[test]
    fn test_mean_pooling_yields_two_groups() {
        let device = Default::default();
        let model = GraphPropertyNet::<TrainingBackend>::new(&small_config(), &device);
        let groups = ParamGroups::for_model(&model, 0.001, 1.0, 0.0);
        assert_eq!(groups.group_count(), 2);
    }

    #[test]
    fn test_attention_pooling_adds_a_group() {
        let device = Default::default();
        let mut config = small_config();
        config.graph_pooling = GraphPooling::Attention;
        let model = GraphPropertyNet::<TrainingBackend>::new(&config, &device);
        let groups = ParamGroups::for_model(&model, 0.001, 0.5, 0.0);
        assert_eq!(groups.group_count(), 3);
    }
}
