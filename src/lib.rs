//! # molprop
//!
//! Pretrained graph neural networks for molecular property prediction,
//! built on the Burn framework.
//!
//! ## Features
//!
//! - **Closed feature vocabulary** mapping atom and bond properties to the
//!   stable indices the pretrained backbones were trained against
//! - **Graph batching** that merges molecules into disjoint batch graphs
//!   with per-atom molecule assignment
//! - **Fine-tuning** with per-component optimizer groups and task-specific
//!   losses (classification or regression)
//! - **Order-preserving batched inference** returning one value per input
//!   molecule
//! - **Whole-model persistence** as an opaque blob inside a string-keyed
//!   save payload
//!
//! ## Modules
//!
//! - `chem`: molecule data model, feature vocabulary, and encoders
//! - `dataset`: graph assembly, Burn dataset, and batcher
//! - `model`: backbone architecture, configuration, optimizer groups,
//!   persistence, and the orchestrator
//! - `training`: the fine-tuning loop
//! - `inference`: the batched prediction loop
//! - `fetch`: checkpoint retrieval capability
//! - `utils`: errors and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use molprop::backend::TrainingBackend;
//! use molprop::{DirectoryFetcher, PretrainedGnn, PretrainedGnnConfig, TaskSetting};
//!
//! let fetcher = DirectoryFetcher::new("artifacts");
//! let mut model = PretrainedGnn::<TrainingBackend>::new(
//!     PretrainedGnnConfig::default(),
//!     TaskSetting::Classification,
//!     Default::default(),
//!     &fetcher,
//! )?;
//!
//! model.fit(&molecules, &labels)?;
//! let predictions = model.predict(&molecules)?;
//! ```

pub mod backend;
pub mod chem;
pub mod dataset;
pub mod fetch;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use chem::featurize::{AtomFeaturizer, BondFeaturizer, ATOM_FEATURE_LEN, BOND_FEATURE_LEN};
pub use chem::vocabulary::FeatureVocabulary;
pub use chem::{Atom, Bond, BondDirection, BondKind, Chirality, Hybridization, Molecule};
pub use dataset::{
    GraphAssembler, MoleculeGraphBatch, MoleculeGraphBatcher, MoleculeGraphDataset,
    MoleculeGraphItem,
};
pub use fetch::{CheckpointFetcher, DirectoryFetcher};
pub use model::config::{
    ConvKind, GraphPooling, LayerAggregation, PretrainedGnnConfig, PretrainedVariant, TaskSetting,
};
pub use model::gnn::GraphPropertyNet;
pub use model::persist::{PayloadValue, SavePayload, MODEL_BLOB_KEY};
pub use model::pretrained::PretrainedGnn;
pub use utils::error::{Error, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
