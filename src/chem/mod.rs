//! Molecule data model.
//!
//! A light structural representation of molecules: atoms with the properties
//! the feature vocabulary indexes, and bonds between atom positions. Graph
//! featurization consumes these types; nothing here depends on tensors.

pub mod featurize;
pub mod vocabulary;

pub use featurize::{AtomFeaturizer, BondFeaturizer};
pub use vocabulary::FeatureVocabulary;

use serde::{Deserialize, Serialize};

/// Tetrahedral chirality tag of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chirality {
    Unspecified,
    TetrahedralCw,
    TetrahedralCcw,
    Other,
}

impl Default for Chirality {
    fn default() -> Self {
        Self::Unspecified
    }
}

/// Orbital hybridization of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hybridization {
    S,
    Sp,
    Sp2,
    Sp3,
    Sp3d,
    Sp3d2,
    Unspecified,
}

impl Default for Hybridization {
    fn default() -> Self {
        Self::Unspecified
    }
}

/// Bond order between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondKind {
    Single,
    Double,
    Triple,
    Aromatic,
}

/// Bond direction, carrying double-bond stereo information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondDirection {
    None,
    EndUpRight,
    EndDownRight,
}

impl Default for BondDirection {
    fn default() -> Self {
        Self::None
    }
}

/// A single atom with the properties the featurizers read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Atomic number (1 = hydrogen, 6 = carbon, ...)
    pub atomic_number: u8,
    /// Chirality tag
    pub chirality: Chirality,
}

impl Atom {
    /// Create an atom with unspecified chirality.
    pub fn new(atomic_number: u8) -> Self {
        Self {
            atomic_number,
            chirality: Chirality::Unspecified,
        }
    }

    /// Set the chirality tag.
    pub fn with_chirality(mut self, chirality: Chirality) -> Self {
        self.chirality = chirality;
        self
    }
}

/// A bond between two atom positions of the owning molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    /// Index of the first endpoint in the molecule's atom list
    pub source: usize,
    /// Index of the second endpoint in the molecule's atom list
    pub target: usize,
    /// Bond order
    pub kind: BondKind,
    /// Stereo direction
    pub direction: BondDirection,
}

impl Bond {
    /// Create a bond with no stereo direction.
    pub fn new(source: usize, target: usize, kind: BondKind) -> Self {
        Self {
            source,
            target,
            kind,
            direction: BondDirection::None,
        }
    }

    /// Set the stereo direction.
    pub fn with_direction(mut self, direction: BondDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// A molecule: atoms plus bonds over atom positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    /// Create an empty molecule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an atom, returning its position.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    /// Append a bond between existing atom positions.
    pub fn add_bond(&mut self, bond: Bond) {
        self.bonds.push(bond);
    }

    /// Number of atoms.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of bonds.
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }
}
