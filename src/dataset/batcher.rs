//! Merging featurized molecule graphs into tensor batches.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

use crate::chem::featurize::{ATOM_FEATURE_LEN, BOND_FEATURE_LEN};
use crate::dataset::MoleculeGraphItem;

/// A batch of molecule graphs merged into one disjoint graph.
///
/// Atom positions are offset per molecule so edge indices reference rows of
/// the merged node matrix; `molecule_ids` maps every atom back to the
/// position of its source molecule within the batch.
#[derive(Clone, Debug)]
pub struct MoleculeGraphBatch<B: Backend> {
    /// Atom feature indices with shape `[num_atoms, ATOM_FEATURE_LEN]`
    pub atom_features: Tensor<B, 2, Int>,
    /// Edge endpoints with shape `[2, num_edges]` (source row, target row)
    pub edge_index: Tensor<B, 2, Int>,
    /// Bond feature indices with shape `[num_edges, BOND_FEATURE_LEN]`
    pub edge_features: Tensor<B, 2, Int>,
    /// Per-atom molecule position with shape `[num_atoms]`
    pub molecule_ids: Tensor<B, 1, Int>,
    /// Property labels with shape `[num_molecules]`, present only when every
    /// item in the batch carries one
    pub labels: Option<Tensor<B, 1>>,
    /// Number of molecules merged into this batch
    pub num_molecules: usize,
}

/// Batcher that merges `MoleculeGraphItem`s on a fixed device.
#[derive(Clone, Debug)]
pub struct MoleculeGraphBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> MoleculeGraphBatcher<B> {
    /// Create a batcher placing tensors on the given device.
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MoleculeGraphItem, MoleculeGraphBatch<B>> for MoleculeGraphBatcher<B> {
    fn batch(&self, items: Vec<MoleculeGraphItem>) -> MoleculeGraphBatch<B> {
        let num_molecules = items.len();
        let total_atoms: usize = items.iter().map(|item| item.num_atoms).sum();
        let total_edges: usize = items.iter().map(|item| item.edge_count()).sum();

        let mut atom_features = Vec::with_capacity(total_atoms * ATOM_FEATURE_LEN);
        let mut sources = Vec::with_capacity(total_edges);
        let mut targets = Vec::with_capacity(total_edges);
        let mut edge_features = Vec::with_capacity(total_edges * BOND_FEATURE_LEN);
        let mut molecule_ids = Vec::with_capacity(total_atoms);
        let mut labels = Vec::with_capacity(num_molecules);

        let mut offset = 0i64;
        for (position, item) in items.iter().enumerate() {
            atom_features.extend_from_slice(&item.atom_features);
            sources.extend(item.edge_sources.iter().map(|source| source + offset));
            targets.extend(item.edge_targets.iter().map(|target| target + offset));
            edge_features.extend_from_slice(&item.edge_features);
            molecule_ids.extend(std::iter::repeat(position as i64).take(item.num_atoms));
            if let Some(label) = item.label {
                labels.push(label);
            }
            offset += item.num_atoms as i64;
        }

        // Row-major [2, E]: source row followed by target row.
        let mut edge_index = sources;
        edge_index.append(&mut targets);

        let atom_features = Tensor::<B, 2, Int>::from_data(
            TensorData::new(atom_features, [total_atoms, ATOM_FEATURE_LEN]),
            &self.device,
        );
        let edge_index = Tensor::<B, 2, Int>::from_data(
            TensorData::new(edge_index, [2, total_edges]),
            &self.device,
        );
        let edge_features = Tensor::<B, 2, Int>::from_data(
            TensorData::new(edge_features, [total_edges, BOND_FEATURE_LEN]),
            &self.device,
        );
        let molecule_ids = Tensor::<B, 1, Int>::from_data(
            TensorData::new(molecule_ids, [total_atoms]),
            &self.device,
        );

        let labels = if num_molecules > 0 && labels.len() == num_molecules {
            Some(Tensor::<B, 1>::from_floats(
                TensorData::new(labels, [num_molecules]),
                &self.device,
            ))
        } else {
            None
        };

        MoleculeGraphBatch {
            atom_features,
            edge_index,
            edge_features,
            molecule_ids,
            labels,
            num_molecules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::chem::{Atom, Bond, BondKind, Molecule};
    use crate::dataset::GraphAssembler;

    fn water() -> Molecule {
        let mut molecule = Molecule::new();
        let o = molecule.add_atom(Atom::new(8));
        let h1 = molecule.add_atom(Atom::new(1));
        let h2 = molecule.add_atom(Atom::new(1));
        molecule.add_bond(Bond::new(o, h1, BondKind::Single));
        molecule.add_bond(Bond::new(o, h2, BondKind::Single));
        molecule
    }

    fn dinitrogen() -> Molecule {
        let mut molecule = Molecule::new();
        let n1 = molecule.add_atom(Atom::new(7));
        let n2 = molecule.add_atom(Atom::new(7));
        molecule.add_bond(Bond::new(n1, n2, BondKind::Triple));
        molecule
    }

    #[test]
    fn test_batch_offsets_and_molecule_ids() {
        let assembler = GraphAssembler::new();
        let items = assembler
            .convert(&[dinitrogen(), water()], &[Some(0.0), Some(1.0)])
            .unwrap();

        let batcher = MoleculeGraphBatcher::<DefaultBackend>::new(Default::default());
        let batch = batcher.batch(items);

        assert_eq!(batch.num_molecules, 2);
        assert_eq!(batch.atom_features.dims(), [5, ATOM_FEATURE_LEN]);
        assert_eq!(batch.edge_index.dims(), [2, 6]);
        assert_eq!(batch.edge_features.dims(), [6, BOND_FEATURE_LEN]);

        let ids: Vec<i64> = batch.molecule_ids.into_data().to_vec().unwrap();
        assert_eq!(ids, vec![0, 0, 1, 1, 1]);

        // Water's first bond (atoms 0-1 locally) lands at rows 2-3.
        let edges: Vec<i64> = batch.edge_index.into_data().to_vec().unwrap();
        let (sources, targets) = edges.split_at(6);
        assert_eq!(sources, &[0, 1, 2, 3, 2, 4]);
        assert_eq!(targets, &[1, 0, 3, 2, 4, 2]);

        let labels: Vec<f32> = batch.labels.unwrap().into_data().to_vec().unwrap();
        assert_eq!(labels, vec![0.0, 1.0]);
    }

    #[test]
    fn test_batch_without_labels() {
        let assembler = GraphAssembler::new();
        let items = assembler.convert(&[water()], &[None]).unwrap();

        let batcher = MoleculeGraphBatcher::<DefaultBackend>::new(Default::default());
        let batch = batcher.batch(items);

        assert!(batch.labels.is_none());
        assert_eq!(batch.num_molecules, 1);
    }

    #[test]
    fn test_batch_with_partial_labels_drops_label_tensor() {
        let assembler = GraphAssembler::new();
        let items = assembler
            .convert(&[water(), dinitrogen()], &[Some(1.0), None])
            .unwrap();

        let batcher = MoleculeGraphBatcher::<DefaultBackend>::new(Default::default());
        let batch = batcher.batch(items);

        assert!(batch.labels.is_none());
    }
}
