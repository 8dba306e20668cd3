//! Model configuration: the closed set of pretrained checkpoints, topology
//! enums, and construction hyperparameters.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::Error;

/// Embedding width the attention-based checkpoints were trained at.
pub const GAT_EMBEDDING_WIDTH: usize = 300;

/// Output interpretation of the prediction head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskSetting {
    /// Raw scores squashed into class probabilities
    Classification,
    /// Continuous values, returned untouched
    Regression,
}

impl TaskSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSetting::Classification => "classification",
            TaskSetting::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message-passing convolution used by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvKind {
    /// Isomorphism-style convolution with an MLP update
    Gin,
    /// Attention-weighted convolution
    Gat,
}

/// How per-atom representations reduce to one row per molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphPooling {
    /// Unweighted mean over each molecule's atoms
    Mean,
    /// Learned attention weights over each molecule's atoms
    Attention,
}

/// How the encoder combines its per-layer node representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerAggregation {
    /// Final layer only
    Last,
    /// Elementwise sum of all layers
    Sum,
}

/// Closed set of published pretrained checkpoints.
///
/// Each name identifies both a checkpoint artifact and the topology it was
/// trained with; the attention-based (`Gat*`) checkpoints fix the
/// convolution kind and embedding width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PretrainedVariant {
    ContextPred,
    EdgePred,
    Infomax,
    Masking,
    SupervisedContextPred,
    SupervisedEdgePred,
    SupervisedInfomax,
    SupervisedMasking,
    Supervised,
    GatSupervisedContextPred,
    GatSupervised,
    GatContextPred,
}

impl PretrainedVariant {
    /// Every published checkpoint, in a stable order.
    pub const ALL: [PretrainedVariant; 12] = [
        PretrainedVariant::ContextPred,
        PretrainedVariant::EdgePred,
        PretrainedVariant::Infomax,
        PretrainedVariant::Masking,
        PretrainedVariant::SupervisedContextPred,
        PretrainedVariant::SupervisedEdgePred,
        PretrainedVariant::SupervisedInfomax,
        PretrainedVariant::SupervisedMasking,
        PretrainedVariant::Supervised,
        PretrainedVariant::GatSupervisedContextPred,
        PretrainedVariant::GatSupervised,
        PretrainedVariant::GatContextPred,
    ];

    /// Artifact name of the checkpoint, as the fetcher knows it.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            PretrainedVariant::ContextPred => "contextpred",
            PretrainedVariant::EdgePred => "edgepred",
            PretrainedVariant::Infomax => "infomax",
            PretrainedVariant::Masking => "masking",
            PretrainedVariant::SupervisedContextPred => "supervised_contextpred",
            PretrainedVariant::SupervisedEdgePred => "supervised_edgepred",
            PretrainedVariant::SupervisedInfomax => "supervised_infomax",
            PretrainedVariant::SupervisedMasking => "supervised_masking",
            PretrainedVariant::Supervised => "supervised",
            PretrainedVariant::GatSupervisedContextPred => "gat_supervised_contextpred",
            PretrainedVariant::GatSupervised => "gat_supervised",
            PretrainedVariant::GatContextPred => "gat_contextpred",
        }
    }

    /// Whether this checkpoint was trained with the attention-based
    /// convolution, which pins the topology it can load into.
    pub fn uses_gat(&self) -> bool {
        matches!(
            self,
            PretrainedVariant::GatSupervisedContextPred
                | PretrainedVariant::GatSupervised
                | PretrainedVariant::GatContextPred
        )
    }
}

impl Default for PretrainedVariant {
    fn default() -> Self {
        Self::ContextPred
    }
}

impl fmt::Display for PretrainedVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact_name())
    }
}

impl FromStr for PretrainedVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.artifact_name() == s)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unknown pretrained model '{s}'"))
            })
    }
}

/// Construction parameters for a pretrained GNN orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainedGnnConfig {
    /// Which pretrained checkpoint to start from
    pub variant: PretrainedVariant,

    /// Molecules per batch
    pub batch_size: usize,

    /// Fine-tuning epochs; the sole stopping criterion
    pub epochs: usize,

    /// Base learning rate (encoder group)
    pub learning_rate: f64,

    /// Multiplier applied to the pooling and head group learning rates
    pub lr_scale: f64,

    /// L2 weight decay for every group
    pub weight_decay: f64,

    /// Number of message-passing layers
    pub num_layers: usize,

    /// Node representation width
    pub embedding_width: usize,

    /// Dropout probability between layers
    pub dropout: f64,

    /// Reduction from atoms to molecules
    pub graph_pooling: GraphPooling,

    /// Combination of per-layer node representations
    pub layer_aggregation: LayerAggregation,

    /// Message-passing convolution kind
    pub conv: ConvKind,

    /// Data-loading workers for fine-tuning
    pub num_workers: usize,

    /// Shuffle seed for the fine-tuning batch stream
    pub seed: u64,
}

impl Default for PretrainedGnnConfig {
    fn default() -> Self {
        Self {
            variant: PretrainedVariant::ContextPred,
            batch_size: 32,
            epochs: 100,
            learning_rate: 0.001,
            lr_scale: 1.0,
            weight_decay: 0.0,
            num_layers: 5,
            embedding_width: 300,
            dropout: 0.5,
            graph_pooling: GraphPooling::Mean,
            layer_aggregation: LayerAggregation::Last,
            conv: ConvKind::Gin,
            num_workers: 4,
            seed: 42,
        }
    }
}

impl PretrainedGnnConfig {
    /// Configuration for a specific checkpoint with default hyperparameters.
    pub fn new(variant: PretrainedVariant) -> Self {
        Self {
            variant,
            ..Default::default()
        }
    }

    /// Apply the variant's topology constraints.
    ///
    /// Attention-based checkpoints override the convolution kind and the
    /// embedding width, whatever the caller requested. Resolution happens
    /// once, here; nothing downstream re-examines the variant name.
    pub fn resolved(mut self) -> Self {
        if self.variant.uses_gat() {
            self.conv = ConvKind::Gat;
            self.embedding_width = GAT_EMBEDDING_WIDTH;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }

        if self.num_layers == 0 {
            return Err("num_layers must be at least 1".to_string());
        }

        if self.embedding_width == 0 {
            return Err("embedding_width must be greater than 0".to_string());
        }

        if self.dropout < 0.0 || self.dropout >= 1.0 {
            return Err("dropout must be in range [0.0, 1.0)".to_string());
        }

        if self.num_workers == 0 {
            return Err("num_workers must be at least 1".to_string());
        }

        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
