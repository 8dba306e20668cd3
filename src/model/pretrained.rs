//! Orchestration of the pretrained backbone: construction, fine-tuning,
//! batched inference, and whole-model persistence.

use burn::{
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    record::{BinBytesRecorder, CompactRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use chrono::Utc;
use tracing::info;

use crate::chem::Molecule;
use crate::dataset::{
    GraphAssembler, MoleculeGraphBatcher, MoleculeGraphDataset, MoleculeGraphItem,
};
use crate::fetch::CheckpointFetcher;
use crate::inference;
use crate::model::config::{PretrainedGnnConfig, PretrainedVariant, TaskSetting};
use crate::model::gnn::GraphPropertyNet;
use crate::model::optim::ParamGroups;
use crate::model::persist::{SavePayload, MODEL_BLOB_KEY};
use crate::training;
use crate::utils::error::{Error, Result};

/// A pretrained graph neural network, fine-tunable for one molecular
/// property-prediction task.
///
/// Owns the backbone, its optimizer groups, and the device; composes the
/// graph assembler with the training and inference loops. The device is
/// fixed at construction.
pub struct PretrainedGnn<B: AutodiffBackend> {
    config: PretrainedGnnConfig,
    task: TaskSetting,
    device: B::Device,
    assembler: GraphAssembler,
    model: GraphPropertyNet<B>,
    groups: ParamGroups<B>,
}

impl<B: AutodiffBackend> core::fmt::Debug for PretrainedGnn<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PretrainedGnn")
            .field("config", &self.config)
            .field("task", &self.task)
            .field("device", &self.device)
            .field("assembler", &self.assembler)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl<B: AutodiffBackend> PretrainedGnn<B> {
    /// Build an orchestrator around the checkpoint named by
    /// `config.variant`.
    ///
    /// The variant's topology constraints are applied before anything else,
    /// then the pretrained encoder weights are fetched and loaded. A failed
    /// fetch or an incompatible checkpoint aborts construction.
    pub fn new(
        config: PretrainedGnnConfig,
        task: TaskSetting,
        device: B::Device,
        fetcher: &dyn CheckpointFetcher,
    ) -> Result<Self> {
        let config = config.resolved();
        config.validate().map_err(Error::InvalidArgument)?;

        let mut model = GraphPropertyNet::new(&config, &device);

        let checkpoint = fetcher.fetch(config.variant.artifact_name())?;
        info!(
            "loading pretrained weights for '{}' from {:?}",
            config.variant, checkpoint
        );
        model.encoder = model
            .encoder
            .load_file(checkpoint, &CompactRecorder::new(), &device)
            .map_err(|e| {
                Error::Serialization(format!(
                    "pretrained checkpoint incompatible with configured encoder: {e:?}"
                ))
            })?;

        let groups = ParamGroups::for_model(
            &model,
            config.learning_rate,
            config.lr_scale,
            config.weight_decay,
        );

        Ok(Self {
            config,
            task,
            device,
            assembler: GraphAssembler::new(),
            model,
            groups,
        })
    }

    /// One orchestrator per published checkpoint, sharing `config`'s
    /// hyperparameters, for side-by-side evaluation.
    pub fn all_pretrained(
        config: PretrainedGnnConfig,
        task: TaskSetting,
        device: B::Device,
        fetcher: &dyn CheckpointFetcher,
    ) -> Result<Vec<Self>> {
        PretrainedVariant::ALL
            .iter()
            .map(|variant| {
                let mut variant_config = config.clone();
                variant_config.variant = *variant;
                Self::new(variant_config, task, device.clone(), fetcher)
            })
            .collect()
    }

    /// Featurize molecules for training or inference.
    ///
    /// When `labels` is absent, a missing-label marker is synthesized per
    /// molecule so the assembler's contract is always satisfied.
    pub fn preprocess(
        &self,
        molecules: &[Molecule],
        labels: Option<&[f32]>,
    ) -> Result<Vec<MoleculeGraphItem>> {
        let labels: Vec<Option<f32>> = match labels {
            Some(values) => {
                if values.len() != molecules.len() {
                    return Err(Error::InvalidArgument(format!(
                        "got {} labels for {} molecules",
                        values.len(),
                        molecules.len()
                    )));
                }
                values.iter().copied().map(Some).collect()
            }
            None => vec![None; molecules.len()],
        };

        self.assembler.convert(molecules, &labels)
    }

    /// Fine-tune on labeled molecules for the configured number of epochs.
    ///
    /// The batch stream is shuffled; the epoch count is the sole stopping
    /// criterion, and zero epochs performs zero optimizer steps.
    pub fn fit(&mut self, molecules: &[Molecule], labels: &[f32]) -> Result<()> {
        let items = self.preprocess(molecules, Some(labels))?;
        let dataset = MoleculeGraphDataset::new(items);

        let batcher = MoleculeGraphBatcher::<B>::new(self.device.clone());
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(self.config.batch_size)
            .shuffle(self.config.seed)
            .num_workers(self.config.num_workers)
            .build(dataset);

        info!(
            "fine-tuning '{}' ({}) for {} epochs on {} molecules",
            self.config.variant,
            self.task,
            self.config.epochs,
            molecules.len()
        );

        for epoch in 0..self.config.epochs {
            let (model, mean_loss) =
                training::train_epoch(self.model.clone(), loader.as_ref(), &mut self.groups, self.task)?;
            self.model = model;
            info!(
                "epoch {}/{}: loss = {:.4}",
                epoch + 1,
                self.config.epochs,
                mean_loss
            );
        }

        Ok(())
    }

    /// Predict one value per molecule, in input order.
    ///
    /// Batches are assembled sequentially from the input ordering and run on
    /// the inner (non-autodiff) backend, so no gradient state is allocated
    /// and stochastic layers are inactive.
    pub fn predict(&self, molecules: &[Molecule]) -> Result<Vec<f32>> {
        if molecules.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.preprocess(molecules, None)?;
        let batcher = MoleculeGraphBatcher::<B::InnerBackend>::new(self.device.clone());
        let batches = items
            .chunks(self.config.batch_size)
            .map(|chunk| batcher.batch(chunk.to_vec()));

        inference::predict(&self.model.valid(), batches, self.task)
    }

    /// Serialize the full model into a save payload.
    ///
    /// The payload carries metadata entries next to one opaque
    /// full-precision weight blob under [`MODEL_BLOB_KEY`].
    pub fn save(&self) -> Result<SavePayload> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let blob = recorder
            .record(self.model.clone().into_record(), ())
            .map_err(|e| Error::Serialization(format!("failed to serialize model: {e:?}")))?;

        let mut payload = SavePayload::new();
        payload.insert_text("variant", self.config.variant.to_string());
        payload.insert_text("task", self.task.as_str());
        payload.insert_text("saved_at", Utc::now().to_rfc3339());
        payload.insert_bytes(MODEL_BLOB_KEY, blob);
        Ok(payload)
    }

    /// Restore the full model from a save payload, replacing the in-memory
    /// weights wholesale.
    pub fn load(&mut self, payload: &SavePayload) -> Result<()> {
        let blob = payload.model_blob()?;

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder.load(blob.to_vec(), &self.device).map_err(|e| {
            Error::Serialization(format!(
                "model blob incompatible with current backbone: {e:?}"
            ))
        })?;
        self.model = self.model.clone().load_record(record);
        Ok(())
    }

    /// Resolved configuration.
    pub fn config(&self) -> &PretrainedGnnConfig {
        &self.config
    }

    /// Task setting inherited at construction.
    pub fn task(&self) -> TaskSetting {
        self.task
    }

    /// Number of optimizer parameter groups.
    pub fn param_group_count(&self) -> usize {
        self.groups.group_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrainingBackend;
    use crate::chem::{Atom, Bond, BondKind, Chirality};
    use crate::fetch::DirectoryFetcher;
    use crate::model::config::{ConvKind, GraphPooling, GAT_EMBEDDING_WIDTH};
    use crate::model::gnn::GnnEncoder;
    use std::path::Path;
    use tempfile::TempDir;

    type B = TrainingBackend;

    fn small_config() -> PretrainedGnnConfig {
        let mut config = PretrainedGnnConfig::new(PretrainedVariant::ContextPred);
        config.embedding_width = 8;
        config.num_layers = 2;
        config.batch_size = 4;
        config.epochs = 1;
        config.num_workers = 1;
        config.dropout = 0.1;
        config
    }

    fn write_artifact(dir: &Path, config: &PretrainedGnnConfig) {
        let resolved = config.clone().resolved();
        let encoder = GnnEncoder::<B>::new(&resolved, &Default::default());
        encoder
            .save_file(
                dir.join(resolved.variant.artifact_name()),
                &CompactRecorder::new(),
            )
            .unwrap();
    }

    fn fixture(config: &PretrainedGnnConfig) -> (TempDir, DirectoryFetcher) {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), config);
        let fetcher = DirectoryFetcher::new(dir.path());
        (dir, fetcher)
    }

    fn sample_molecules() -> Vec<Molecule> {
        let mut molecules = Vec::new();
        for heavy in [6u8, 7, 8, 9, 15, 16] {
            let mut molecule = Molecule::new();
            let center =
                molecule.add_atom(Atom::new(heavy).with_chirality(Chirality::Unspecified));
            let h1 = molecule.add_atom(Atom::new(1));
            let h2 = molecule.add_atom(Atom::new(1));
            molecule.add_bond(Bond::new(center, h1, BondKind::Single));
            molecule.add_bond(Bond::new(center, h2, BondKind::Single));
            molecules.push(molecule);
        }
        molecules
    }

    #[test]
    fn test_construction_requires_a_fetchable_checkpoint() {
        let dir = TempDir::new().unwrap();
        let fetcher = DirectoryFetcher::new(dir.path());

        let err = PretrainedGnn::<B>::new(
            small_config(),
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ArtifactFetch(_)));
    }

    #[test]
    fn test_construction_loads_pretrained_encoder() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);

        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();
        assert_eq!(model.param_group_count(), 2);
        assert_eq!(model.task(), TaskSetting::Classification);
    }

    #[test]
    fn test_attention_pooling_gets_a_third_group() {
        let mut config = small_config();
        config.graph_pooling = GraphPooling::Attention;
        let (_dir, fetcher) = fixture(&config);

        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();
        assert_eq!(model.param_group_count(), 3);
    }

    #[test]
    fn test_gat_variant_construction_forces_topology() {
        let mut config = small_config();
        config.variant = PretrainedVariant::GatContextPred;
        config.embedding_width = 64;
        let (_dir, fetcher) = fixture(&config);

        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();
        assert_eq!(model.config().conv, ConvKind::Gat);
        assert_eq!(model.config().embedding_width, GAT_EMBEDDING_WIDTH);
    }

    #[test]
    fn test_predict_empty_input() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let predictions = model.predict(&[]).unwrap();
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_predict_is_idempotent_and_aligned() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let molecules = sample_molecules();
        let first = model.predict(&molecules).unwrap();
        let second = model.predict(&molecules).unwrap();

        assert_eq!(first.len(), molecules.len());
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_classification_outputs_are_bounded() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let predictions = model.predict(&sample_molecules()).unwrap();
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_batch_size_does_not_reorder_predictions() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let donor = PretrainedGnn::<B>::new(
            config.clone(),
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        // Same weights, different batch size.
        let mut wide_config = config;
        wide_config.batch_size = 32;
        let mut wide = PretrainedGnn::<B>::new(
            wide_config,
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();
        wide.load(&donor.save().unwrap()).unwrap();

        let molecules = sample_molecules();
        let narrow_out = donor.predict(&molecules).unwrap();
        let wide_out = wide.predict(&molecules).unwrap();

        assert_eq!(narrow_out.len(), wide_out.len());
        for (a, b) in narrow_out.iter().zip(&wide_out) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_save_load_round_trip_reproduces_predictions() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let original = PretrainedGnn::<B>::new(
            config.clone(),
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let payload = original.save().unwrap();
        assert!(payload.bytes(MODEL_BLOB_KEY).is_some());
        assert_eq!(payload.text("task"), Some("classification"));

        let mut restored = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();
        restored.load(&payload).unwrap();

        let molecules = sample_molecules();
        let before = original.predict(&molecules).unwrap();
        let after = restored.predict(&molecules).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_load_rejects_payload_without_blob() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let mut model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let mut payload = SavePayload::new();
        payload.insert_text("variant", "contextpred");
        let err = model.load(&payload).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_fit_with_zero_epochs_changes_nothing() {
        let mut config = small_config();
        config.epochs = 0;
        let (_dir, fetcher) = fixture(&config);
        let mut model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let molecules = sample_molecules();
        let labels = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];

        let before = model.predict(&molecules).unwrap();
        model.fit(&molecules, &labels).unwrap();
        let after = model.predict(&molecules).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_fit_runs_and_updates_parameters() {
        let mut config = small_config();
        config.epochs = 2;
        let (_dir, fetcher) = fixture(&config);
        let mut model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let molecules = sample_molecules();
        let labels = vec![0.2, 0.4, 0.6, 0.8, 1.0, 1.2];

        let before = model.predict(&molecules).unwrap();
        model.fit(&molecules, &labels).unwrap();
        let after = model.predict(&molecules).unwrap();

        assert_eq!(after.len(), molecules.len());
        assert!(before
            .iter()
            .zip(&after)
            .any(|(a, b)| (a - b).abs() > 1e-7));
    }

    #[test]
    fn test_fit_rejects_mismatched_labels() {
        let config = small_config();
        let (_dir, fetcher) = fixture(&config);
        let mut model = PretrainedGnn::<B>::new(
            config,
            TaskSetting::Regression,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        let err = model.fit(&sample_molecules(), &[1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_all_pretrained_covers_every_variant() {
        let dir = TempDir::new().unwrap();
        let base = small_config();
        for variant in PretrainedVariant::ALL {
            let mut config = base.clone();
            config.variant = variant;
            write_artifact(dir.path(), &config);
        }
        let fetcher = DirectoryFetcher::new(dir.path());

        let models = PretrainedGnn::<B>::all_pretrained(
            base,
            TaskSetting::Classification,
            Default::default(),
            &fetcher,
        )
        .unwrap();

        assert_eq!(models.len(), PretrainedVariant::ALL.len());
        for (model, variant) in models.iter().zip(PretrainedVariant::ALL) {
            assert_eq!(model.config().variant, variant);
            if variant.uses_gat() {
                assert_eq!(model.config().embedding_width, GAT_EMBEDDING_WIDTH);
            }
        }
    }
}
