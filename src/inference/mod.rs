//! Batched inference with strict input-order preservation.

use burn::tensor::{activation, backend::Backend, Tensor};
use tracing::debug;

use crate::dataset::MoleculeGraphBatch;
use crate::model::config::TaskSetting;
use crate::model::gnn::GraphPropertyNet;
use crate::utils::error::{Error, Result};

/// Run the model over `batches` in the exact order supplied and return one
/// scalar per molecule, aligned with that order.
///
/// Classification scores pass through a sigmoid into `[0, 1]`; regression
/// outputs are returned untouched. An empty batch stream yields an empty
/// vector.
pub fn predict<B: Backend>(
    model: &GraphPropertyNet<B>,
    batches: impl IntoIterator<Item = MoleculeGraphBatch<B>>,
    task: TaskSetting,
) -> Result<Vec<f32>> {
    let mut outputs = Vec::new();
    for (step, batch) in batches.into_iter().enumerate() {
        let predictions = model.forward(&batch);
        debug!(
            "  inference batch {}: {} molecules",
            step + 1,
            batch.num_molecules
        );
        outputs.push(predictions);
    }

    if outputs.is_empty() {
        return Ok(Vec::new());
    }

    let merged = Tensor::cat(outputs, 0);
    let merged = match task {
        TaskSetting::Classification => activation::sigmoid(merged),
        TaskSetting::Regression => merged,
    };

    let [rows, columns] = merged.dims();
    merged
        .reshape([rows * columns])
        .into_data()
        .to_vec()
        .map_err(|e| Error::Tensor(format!("failed to read predictions: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::chem::{Atom, Bond, BondKind, Molecule};
    use crate::dataset::{GraphAssembler, MoleculeGraphBatcher};
    use crate::model::config::{PretrainedGnnConfig, PretrainedVariant};
    use burn::data::dataloader::batcher::Batcher;

    fn small_model() -> GraphPropertyNet<DefaultBackend> {
        let mut config = PretrainedGnnConfig::new(PretrainedVariant::ContextPred);
        config.embedding_width = 8;
        config.num_layers = 2;
        GraphPropertyNet::new(&config, &Default::default())
    }

    fn methanol() -> Molecule {
        let mut molecule = Molecule::new();
        let c = molecule.add_atom(Atom::new(6));
        let o = molecule.add_atom(Atom::new(8));
        molecule.add_bond(Bond::new(c, o, BondKind::Single));
        molecule
    }

    fn batches_of(
        molecules: &[Molecule],
        batch_size: usize,
    ) -> Vec<MoleculeGraphBatch<DefaultBackend>> {
        let labels = vec![None; molecules.len()];
        let items = GraphAssembler::new().convert(molecules, &labels).unwrap();
        let batcher = MoleculeGraphBatcher::new(Default::default());
        items
            .chunks(batch_size)
            .map(|chunk| batcher.batch(chunk.to_vec()))
            .collect()
    }

    #[test]
    fn test_empty_stream_yields_empty_predictions() {
        let model = small_model();
        let predictions = predict(&model, Vec::new(), TaskSetting::Classification).unwrap();
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_output_length_matches_input_count() {
        let model = small_model();
        let molecules = vec![methanol(); 7];

        let predictions =
            predict(&model, batches_of(&molecules, 3), TaskSetting::Regression).unwrap();
        assert_eq!(predictions.len(), 7);
    }

    #[test]
    fn test_classification_outputs_are_probabilities() {
        let model = small_model();
        let molecules = vec![methanol(); 5];

        let predictions =
            predict(&model, batches_of(&molecules, 2), TaskSetting::Classification).unwrap();
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_batch_size_does_not_change_ordering() {
        let model = small_model();
        let molecules = vec![methanol(); 6];

        let single = predict(&model, batches_of(&molecules, 1), TaskSetting::Regression).unwrap();
        let grouped = predict(&model, batches_of(&molecules, 4), TaskSetting::Regression).unwrap();

        assert_eq!(single.len(), grouped.len());
        for (a, b) in single.iter().zip(&grouped) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
