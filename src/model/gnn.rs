//! Graph neural network backbone.
//!
//! The encoder embeds atom and bond vocabulary indices and runs a stack of
//! message-passing layers over the merged batch graph; graph pooling reduces
//! atom rows to one row per molecule, and a linear head emits one raw score
//! per molecule. Message passing is expressed with gather/scatter tensor ops
//! (`select` / `select_assign`) over the batch's edge index.

use burn::{
    module::Module,
    nn::{
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    tensor::{activation, backend::Backend, Int, Tensor, TensorData},
};

use crate::chem::vocabulary::FeatureVocabulary;
use crate::dataset::MoleculeGraphBatch;
use crate::model::config::{ConvKind, GraphPooling, LayerAggregation, PretrainedGnnConfig};

/// Negative slope of the attention score nonlinearity.
const ATTENTION_SLOPE: f64 = 0.2;

/// Guard against division by zero when normalizing attention weights.
const NORMALIZER_FLOOR: f64 = 1e-16;

/// Sums learned embeddings of the two atom feature indices.
#[derive(Module, Debug)]
pub struct AtomEmbedding<B: Backend> {
    atomic_number: Embedding<B>,
    chirality: Embedding<B>,
}

impl<B: Backend> AtomEmbedding<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        let vocab = FeatureVocabulary::shared();
        Self {
            atomic_number: EmbeddingConfig::new(vocab.atomic_number_count(), width).init(device),
            chirality: EmbeddingConfig::new(vocab.chirality_count(), width).init(device),
        }
    }

    /// `features` has shape `[num_atoms, 2]`; returns `[num_atoms, width]`.
    pub fn forward(&self, features: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [num_atoms, _] = features.dims();
        let numbers = features
            .clone()
            .slice([0..num_atoms, 0..1])
            .reshape([1, num_atoms]);
        let tags = features.slice([0..num_atoms, 1..2]).reshape([1, num_atoms]);

        let embedded = self.atomic_number.forward(numbers) + self.chirality.forward(tags);
        let [_, _, width] = embedded.dims();
        embedded.reshape([num_atoms, width])
    }
}

/// Sums learned embeddings of the two bond feature indices.
#[derive(Module, Debug)]
pub struct BondEmbedding<B: Backend> {
    kind: Embedding<B>,
    direction: Embedding<B>,
}

impl<B: Backend> BondEmbedding<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        let vocab = FeatureVocabulary::shared();
        Self {
            kind: EmbeddingConfig::new(vocab.bond_kind_count(), width).init(device),
            direction: EmbeddingConfig::new(vocab.bond_direction_count(), width).init(device),
        }
    }

    /// `features` has shape `[num_edges, 2]`; returns `[num_edges, width]`.
    pub fn forward(&self, features: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [num_edges, _] = features.dims();
        let kinds = features
            .clone()
            .slice([0..num_edges, 0..1])
            .reshape([1, num_edges]);
        let directions = features.slice([0..num_edges, 1..2]).reshape([1, num_edges]);

        let embedded = self.kind.forward(kinds) + self.direction.forward(directions);
        let [_, _, width] = embedded.dims();
        embedded.reshape([num_edges, width])
    }
}

/// Isomorphism-style convolution: sum incoming bond-aware messages, then an
/// MLP update over the combined representation.
#[derive(Module, Debug)]
pub struct GinConv<B: Backend> {
    bond_embedding: BondEmbedding<B>,
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> GinConv<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            bond_embedding: BondEmbedding::new(width, device),
            hidden: LinearConfig::new(width, 2 * width).init(device),
            output: LinearConfig::new(2 * width, width).init(device),
        }
    }

    pub fn forward(
        &self,
        nodes: Tensor<B, 2>,
        sources: Tensor<B, 1, Int>,
        targets: Tensor<B, 1, Int>,
        edge_features: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let aggregated = if edge_features.dims()[0] == 0 {
            nodes.zeros_like()
        } else {
            let edges = self.bond_embedding.forward(edge_features);
            let messages = nodes.clone().select(0, sources) + edges;
            nodes.zeros_like().select_assign(0, targets, messages)
        };

        let combined = nodes + aggregated;
        self.output
            .forward(activation::relu(self.hidden.forward(combined)))
    }
}

/// Attention-weighted convolution: incoming messages are normalized per
/// target atom by softmaxed edge scores.
#[derive(Module, Debug)]
pub struct GatConv<B: Backend> {
    bond_embedding: BondEmbedding<B>,
    projection: Linear<B>,
    attention_source: Linear<B>,
    attention_target: Linear<B>,
}

impl<B: Backend> GatConv<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            bond_embedding: BondEmbedding::new(width, device),
            projection: LinearConfig::new(width, width).init(device),
            attention_source: LinearConfig::new(width, 1).init(device),
            attention_target: LinearConfig::new(width, 1).init(device),
        }
    }

    pub fn forward(
        &self,
        nodes: Tensor<B, 2>,
        sources: Tensor<B, 1, Int>,
        targets: Tensor<B, 1, Int>,
        edge_features: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let projected = self.projection.forward(nodes);
        if edge_features.dims()[0] == 0 {
            return projected;
        }

        let edges = self.bond_embedding.forward(edge_features);

        let source_scores = self.attention_source.forward(projected.clone());
        let target_scores = self.attention_target.forward(projected.clone());
        let scores = source_scores.select(0, sources.clone())
            + target_scores.select(0, targets.clone());
        let scores = scores.clone().clamp_min(0.0)
            + scores.clamp_max(0.0).mul_scalar(ATTENTION_SLOPE);

        let weights = scores.exp();
        let [num_atoms, _] = projected.dims();
        let normalizer = Tensor::zeros([num_atoms, 1], &projected.device())
            .select_assign(0, targets.clone(), weights.clone())
            .select(0, targets.clone())
            .add_scalar(NORMALIZER_FLOOR);
        let weights = weights / normalizer;

        let messages = (projected.clone().select(0, sources) + edges) * weights;
        let aggregated = projected.zeros_like().select_assign(0, targets, messages);
        projected + aggregated
    }
}

/// One message-passing layer.
#[derive(Module, Debug)]
pub enum GraphConv<B: Backend> {
    Gin(GinConv<B>),
    Gat(GatConv<B>),
}

impl<B: Backend> GraphConv<B> {
    pub fn forward(
        &self,
        nodes: Tensor<B, 2>,
        sources: Tensor<B, 1, Int>,
        targets: Tensor<B, 1, Int>,
        edge_features: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        match self {
            GraphConv::Gin(conv) => conv.forward(nodes, sources, targets, edge_features),
            GraphConv::Gat(conv) => conv.forward(nodes, sources, targets, edge_features),
        }
    }
}

/// The pretrained part of the network: atom embeddings plus the
/// message-passing stack. Checkpoint artifacts hold exactly this module's
/// record.
#[derive(Module, Debug)]
pub struct GnnEncoder<B: Backend> {
    atom_embedding: AtomEmbedding<B>,
    layers: Vec<GraphConv<B>>,
    norms: Vec<LayerNorm<B>>,
    dropout: Dropout,
    sum_layer_outputs: bool,
}

impl<B: Backend> GnnEncoder<B> {
    pub fn new(config: &PretrainedGnnConfig, device: &B::Device) -> Self {
        let width = config.embedding_width;

        let layers = (0..config.num_layers)
            .map(|_| match config.conv {
                ConvKind::Gin => GraphConv::Gin(GinConv::new(width, device)),
                ConvKind::Gat => GraphConv::Gat(GatConv::new(width, device)),
            })
            .collect();
        let norms = (0..config.num_layers)
            .map(|_| LayerNormConfig::new(width).init(device))
            .collect();

        Self {
            atom_embedding: AtomEmbedding::new(width, device),
            layers,
            norms,
            dropout: DropoutConfig::new(config.dropout).init(),
            sum_layer_outputs: matches!(config.layer_aggregation, LayerAggregation::Sum),
        }
    }

    /// Per-atom representations with shape `[num_atoms, width]`.
    pub fn forward(
        &self,
        atom_features: Tensor<B, 2, Int>,
        sources: Tensor<B, 1, Int>,
        targets: Tensor<B, 1, Int>,
        edge_features: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let mut hidden = self.atom_embedding.forward(atom_features);
        let mut summed: Option<Tensor<B, 2>> = None;
        let last = self.layers.len() - 1;

        for (index, (layer, norm)) in self.layers.iter().zip(self.norms.iter()).enumerate() {
            hidden = norm.forward(layer.forward(
                hidden,
                sources.clone(),
                targets.clone(),
                edge_features.clone(),
            ));
            // No nonlinearity after the final layer.
            hidden = if index == last {
                self.dropout.forward(hidden)
            } else {
                self.dropout.forward(activation::relu(hidden))
            };

            if self.sum_layer_outputs {
                summed = Some(match summed {
                    Some(total) => total + hidden.clone(),
                    None => hidden.clone(),
                });
            }
        }

        match summed {
            Some(total) => total,
            None => hidden,
        }
    }
}

/// Attention-weighted reduction of atom rows to one row per molecule.
#[derive(Module, Debug)]
pub struct AttentionPooling<B: Backend> {
    gate: Linear<B>,
}

impl<B: Backend> AttentionPooling<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            gate: LinearConfig::new(width, 1).init(device),
        }
    }

    pub fn forward(
        &self,
        nodes: Tensor<B, 2>,
        molecule_ids: Tensor<B, 1, Int>,
        num_molecules: usize,
    ) -> Tensor<B, 2> {
        let device = nodes.device();
        let [_, width] = nodes.dims();

        let weights = self.gate.forward(nodes.clone()).exp();
        let normalizer = Tensor::zeros([num_molecules, 1], &device)
            .select_assign(0, molecule_ids.clone(), weights.clone())
            .select(0, molecule_ids.clone())
            .add_scalar(NORMALIZER_FLOOR);
        let weighted = nodes * (weights / normalizer);

        Tensor::zeros([num_molecules, width], &device).select_assign(0, molecule_ids, weighted)
    }
}

/// Unweighted mean of each molecule's atom rows.
fn mean_pool<B: Backend>(
    nodes: Tensor<B, 2>,
    molecule_ids: Tensor<B, 1, Int>,
    num_molecules: usize,
) -> Tensor<B, 2> {
    let device = nodes.device();
    let [num_atoms, width] = nodes.dims();

    let sums =
        Tensor::zeros([num_molecules, width], &device).select_assign(0, molecule_ids.clone(), nodes);
    let ones = Tensor::ones([num_atoms, 1], &device);
    let counts = Tensor::zeros([num_molecules, 1], &device)
        .select_assign(0, molecule_ids, ones)
        .clamp_min(1.0);

    sums / counts
}

/// Pretrained encoder, graph pooling, and the scalar prediction head.
#[derive(Module, Debug)]
pub struct GraphPropertyNet<B: Backend> {
    pub encoder: GnnEncoder<B>,
    /// Attention pooling gate; `None` selects mean pooling.
    pub pool: Option<AttentionPooling<B>>,
    pub head: Linear<B>,
}

impl<B: Backend> GraphPropertyNet<B> {
    pub fn new(config: &PretrainedGnnConfig, device: &B::Device) -> Self {
        let width = config.embedding_width;
        let pool = match config.graph_pooling {
            GraphPooling::Mean => None,
            GraphPooling::Attention => Some(AttentionPooling::new(width, device)),
        };

        Self {
            encoder: GnnEncoder::new(config, device),
            pool,
            head: LinearConfig::new(width, 1).init(device),
        }
    }

    /// Raw per-molecule scores with shape `[num_molecules, 1]`.
    pub fn forward(&self, batch: &MoleculeGraphBatch<B>) -> Tensor<B, 2> {
        let [_, num_edges] = batch.edge_index.dims();
        let device = batch.atom_features.device();

        let (sources, targets) = if num_edges == 0 {
            let empty = Tensor::<B, 1, Int>::from_data(
                TensorData::new(Vec::<i64>::new(), [0]),
                &device,
            );
            (empty.clone(), empty)
        } else {
            (
                batch
                    .edge_index
                    .clone()
                    .slice([0..1, 0..num_edges])
                    .reshape([num_edges]),
                batch
                    .edge_index
                    .clone()
                    .slice([1..2, 0..num_edges])
                    .reshape([num_edges]),
            )
        };

        let nodes = self.encoder.forward(
            batch.atom_features.clone(),
            sources,
            targets,
            batch.edge_features.clone(),
        );

        let pooled = match &self.pool {
            Some(attention) => {
                attention.forward(nodes, batch.molecule_ids.clone(), batch.num_molecules)
            }
            None => mean_pool(nodes, batch.molecule_ids.clone(), batch.num_molecules),
        };

        self.head.forward(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::chem::{Atom, Bond, BondKind, Molecule};
    use crate::dataset::{GraphAssembler, MoleculeGraphBatcher};
    use crate::model::config::PretrainedVariant;
    use burn::data::dataloader::batcher::Batcher;

    fn small_config() -> PretrainedGnnConfig {
        let mut config = PretrainedGnnConfig::new(PretrainedVariant::ContextPred);
        config.embedding_width = 8;
        config.num_layers = 2;
        config.dropout = 0.1;
        config
    }

    fn test_batch(molecules: &[Molecule]) -> MoleculeGraphBatch<DefaultBackend> {
        let labels = vec![None; molecules.len()];
        let items = GraphAssembler::new().convert(molecules, &labels).unwrap();
        MoleculeGraphBatcher::new(Default::default()).batch(items)
    }

    fn ethene() -> Molecule {
        let mut molecule = Molecule::new();
        let c1 = molecule.add_atom(Atom::new(6));
        let c2 = molecule.add_atom(Atom::new(6));
        let h1 = molecule.add_atom(Atom::new(1));
        let h2 = molecule.add_atom(Atom::new(1));
        molecule.add_bond(Bond::new(c1, c2, BondKind::Double));
        molecule.add_bond(Bond::new(c1, h1, BondKind::Single));
        molecule.add_bond(Bond::new(c2, h2, BondKind::Single));
        molecule
    }

    fn helium() -> Molecule {
        let mut molecule = Molecule::new();
        molecule.add_atom(Atom::new(2));
        molecule
    }

    #[test]
    fn test_forward_shape_gin_mean() {
        let device = Default::default();
        let model = GraphPropertyNet::<DefaultBackend>::new(&small_config(), &device);

        let batch = test_batch(&[ethene(), ethene(), ethene()]);
        let output = model.forward(&batch);
        assert_eq!(output.dims(), [3, 1]);
    }

    #[test]
    fn test_forward_shape_gat_attention() {
        let device = Default::default();
        let mut config = small_config();
        config.conv = ConvKind::Gat;
        config.graph_pooling = GraphPooling::Attention;
        let model = GraphPropertyNet::<DefaultBackend>::new(&config, &device);

        let batch = test_batch(&[ethene(), ethene()]);
        let output = model.forward(&batch);
        assert_eq!(output.dims(), [2, 1]);
        assert!(model.pool.is_some());
    }

    #[test]
    fn test_forward_handles_bondless_molecule() {
        let device = Default::default();
        let model = GraphPropertyNet::<DefaultBackend>::new(&small_config(), &device);

        let batch = test_batch(&[helium()]);
        let output = model.forward(&batch);
        assert_eq!(output.dims(), [1, 1]);
    }

    #[test]
    fn test_forward_with_sum_aggregation() {
        let device = Default::default();
        let mut config = small_config();
        config.layer_aggregation = LayerAggregation::Sum;
        let model = GraphPropertyNet::<DefaultBackend>::new(&config, &device);

        let batch = test_batch(&[ethene(), helium()]);
        let output = model.forward(&batch);
        assert_eq!(output.dims(), [2, 1]);
    }

    #[test]
    fn test_forward_is_deterministic_outside_training() {
        let device = Default::default();
        let model = GraphPropertyNet::<DefaultBackend>::new(&small_config(), &device);

        let batch = test_batch(&[ethene()]);
        let first: Vec<f32> = model
            .forward(&batch)
            .into_data()
            .to_vec()
            .unwrap();
        let second: Vec<f32> = model
            .forward(&batch)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(first, second);
    }
}
