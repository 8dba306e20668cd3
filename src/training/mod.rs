//! Fine-tuning loop and task losses.
//!
//! One epoch walks the full batch stream: forward pass, label reshape to the
//! prediction shape, task loss, backward pass, one optimizer step per batch.
//! Epoch count is the sole stopping criterion. Gradient clipping,
//! learning-rate scheduling, and early stopping are deliberately absent from
//! this layer.

use burn::{
    data::dataloader::DataLoader,
    nn::loss::{MseLoss, Reduction},
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use tracing::debug;

use crate::dataset::MoleculeGraphBatch;
use crate::model::config::TaskSetting;
use crate::model::gnn::GraphPropertyNet;
use crate::model::optim::ParamGroups;
use crate::utils::error::{Error, Result};

/// Run one training epoch over `loader`.
///
/// Returns the updated model and the mean batch loss. Label/prediction
/// element counts are checked before the reshape; a mismatch aborts the
/// epoch with `Error::ShapeMismatch`.
pub fn train_epoch<B: AutodiffBackend>(
    mut model: GraphPropertyNet<B>,
    loader: &dyn DataLoader<MoleculeGraphBatch<B>>,
    groups: &mut ParamGroups<B>,
    task: TaskSetting,
) -> Result<(GraphPropertyNet<B>, f64)> {
    let mut total_loss = 0.0;
    let mut batches = 0usize;

    for (step, batch) in loader.iter().enumerate() {
        let predictions = model.forward(&batch);
        let labels = batch.labels.clone().ok_or_else(|| {
            Error::Training("batch carries no labels; fit requires labeled molecules".to_string())
        })?;

        let [rows, columns] = predictions.dims();
        let label_count = labels.dims()[0];
        if label_count != rows * columns {
            return Err(Error::ShapeMismatch {
                predictions: rows * columns,
                labels: label_count,
            });
        }
        let labels = labels.reshape([rows, columns]);

        let loss = match task {
            TaskSetting::Classification => {
                binary_cross_entropy_with_logits(predictions, labels)
            }
            TaskSetting::Regression => {
                MseLoss::new().forward(predictions, labels, Reduction::Mean)
            }
        };

        let loss_value: f64 = loss.clone().into_scalar().elem();
        total_loss += loss_value;
        batches += 1;

        let gradients = loss.backward();
        model = groups.step(gradients, model);

        if (step + 1) % 10 == 0 {
            debug!("  batch {}: loss = {:.4}", step + 1, loss_value);
        }
    }

    let mean_loss = if batches > 0 {
        total_loss / batches as f64
    } else {
        0.0
    };
    Ok((model, mean_loss))
}

/// Elementwise binary cross-entropy on raw scores, averaged over all
/// elements after the elementwise pass.
///
/// Uses the numerically stable form
/// `max(x, 0) - x * y + ln(1 + exp(-|x|))`.
fn binary_cross_entropy_with_logits<B: AutodiffBackend>(
    scores: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let loss_matrix = scores.clone().clamp_min(0.0) - scores.clone() * targets
        + scores.abs().neg().exp().add_scalar(1.0).log();
    loss_matrix.mean()
}
