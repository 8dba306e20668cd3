//! Graph assembly and batching for molecule inputs.
//!
//! `GraphAssembler` featurizes molecules into `MoleculeGraphItem`s, which the
//! Burn `Dataset`/`Batcher` pair turns into merged graph tensor batches.
//! Labels travel with items as optional values so the same pipeline serves
//! fine-tuning (all labeled) and inference (no labels).

pub mod batcher;

pub use batcher::{MoleculeGraphBatch, MoleculeGraphBatcher};

use burn::data::dataset::Dataset;

use crate::chem::featurize::{AtomFeaturizer, BondFeaturizer, ATOM_FEATURE_LEN, BOND_FEATURE_LEN};
use crate::chem::Molecule;
use crate::utils::error::{Error, Result};

/// One molecule featurized into graph components, ready for batching.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeGraphItem {
    /// Atom feature indices, flattened `[num_atoms * ATOM_FEATURE_LEN]`
    pub atom_features: Vec<i64>,
    /// Number of atoms
    pub num_atoms: usize,
    /// Edge source atom positions (bonds emitted in both directions)
    pub edge_sources: Vec<i64>,
    /// Edge target atom positions
    pub edge_targets: Vec<i64>,
    /// Bond feature indices, flattened `[num_edges * BOND_FEATURE_LEN]`
    pub edge_features: Vec<i64>,
    /// Property label, absent for inference-only items
    pub label: Option<f32>,
}

impl MoleculeGraphItem {
    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edge_sources.len()
    }
}

/// Converts molecules plus optional labels into graph items.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphAssembler {
    atoms: AtomFeaturizer,
    bonds: BondFeaturizer,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Featurize every molecule, pairing it with its label slot.
    ///
    /// `labels` must be exactly as long as `molecules`; a `None` entry marks
    /// an unlabeled molecule.
    pub fn convert(
        &self,
        molecules: &[Molecule],
        labels: &[Option<f32>],
    ) -> Result<Vec<MoleculeGraphItem>> {
        if molecules.len() != labels.len() {
            return Err(Error::InvalidArgument(format!(
                "got {} labels for {} molecules",
                labels.len(),
                molecules.len()
            )));
        }

        molecules
            .iter()
            .zip(labels)
            .map(|(molecule, label)| self.convert_one(molecule, *label))
            .collect()
    }

    fn convert_one(&self, molecule: &Molecule, label: Option<f32>) -> Result<MoleculeGraphItem> {
        let num_atoms = molecule.atom_count();

        let mut atom_features = Vec::with_capacity(num_atoms * ATOM_FEATURE_LEN);
        for atom in &molecule.atoms {
            atom_features.extend(self.atoms.convert(atom)?);
        }

        let num_edges = 2 * molecule.bond_count();
        let mut edge_sources = Vec::with_capacity(num_edges);
        let mut edge_targets = Vec::with_capacity(num_edges);
        let mut edge_features = Vec::with_capacity(num_edges * BOND_FEATURE_LEN);

        for bond in &molecule.bonds {
            if bond.source >= num_atoms || bond.target >= num_atoms {
                return Err(Error::Graph(format!(
                    "bond {}-{} references an atom outside the molecule ({} atoms)",
                    bond.source, bond.target, num_atoms
                )));
            }

            let features = self.bonds.convert(bond)?;
            edge_sources.push(bond.source as i64);
            edge_targets.push(bond.target as i64);
            edge_features.extend(features);
            edge_sources.push(bond.target as i64);
            edge_targets.push(bond.source as i64);
            edge_features.extend(features);
        }

        Ok(MoleculeGraphItem {
            atom_features,
            num_atoms,
            edge_sources,
            edge_targets,
            edge_features,
            label,
        })
    }
}

/// In-memory dataset of featurized molecule graphs.
#[derive(Debug, Clone)]
pub struct MoleculeGraphDataset {
    items: Vec<MoleculeGraphItem>,
}

impl MoleculeGraphDataset {
    pub fn new(items: Vec<MoleculeGraphItem>) -> Self {
        Self { items }
    }

    /// All items, in insertion order.
    pub fn items(&self) -> &[MoleculeGraphItem] {
        &self.items
    }
}

impl Dataset<MoleculeGraphItem> for MoleculeGraphDataset {
    fn get(&self, index: usize) -> Option<MoleculeGraphItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
