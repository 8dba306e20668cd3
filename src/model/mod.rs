//! Model architecture, configuration, optimization, and persistence.

pub mod config;
pub mod gnn;
pub mod optim;
pub mod persist;
pub mod pretrained;

pub use config::{
    ConvKind, GraphPooling, LayerAggregation, PretrainedGnnConfig, PretrainedVariant, TaskSetting,
};
pub use gnn::{GnnEncoder, GraphPropertyNet};
pub use optim::ParamGroups;
pub use persist::{PayloadValue, SavePayload, MODEL_BLOB_KEY};
pub use pretrained::PretrainedGnn;
