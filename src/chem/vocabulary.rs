//! Closed feature vocabulary for chemical entities.
//!
//! Each property category is an ordered sequence of allowed values. The
//! pretrained backbone was trained against these positions, so the order of
//! every sequence is frozen: an index must mean the same value for the
//! lifetime of any trained model. Values outside a sequence fail lookup;
//! there is no fallback "unknown" bucket.

use std::fmt::Debug;
use std::sync::OnceLock;

use crate::chem::{BondDirection, BondKind, Chirality, Hybridization};
use crate::utils::error::{Error, Result};

/// Ordered allowed-value tables, one per chemical property category.
#[derive(Debug, Clone)]
pub struct FeatureVocabulary {
    atomic_numbers: Vec<u8>,
    formal_charges: Vec<i8>,
    chirality_tags: Vec<Chirality>,
    hybridizations: Vec<Hybridization>,
    hydrogen_counts: Vec<u8>,
    implicit_valences: Vec<u8>,
    degrees: Vec<u8>,
    bond_kinds: Vec<BondKind>,
    bond_directions: Vec<BondDirection>,
}

impl FeatureVocabulary {
    fn new() -> Self {
        Self {
            atomic_numbers: (1..=118).collect(),
            formal_charges: (-5..=5).collect(),
            chirality_tags: vec![
                Chirality::Unspecified,
                Chirality::TetrahedralCw,
                Chirality::TetrahedralCcw,
                Chirality::Other,
            ],
            hybridizations: vec![
                Hybridization::S,
                Hybridization::Sp,
                Hybridization::Sp2,
                Hybridization::Sp3,
                Hybridization::Sp3d,
                Hybridization::Sp3d2,
                Hybridization::Unspecified,
            ],
            hydrogen_counts: (0..=8).collect(),
            implicit_valences: (0..=6).collect(),
            degrees: (0..=10).collect(),
            bond_kinds: vec![
                BondKind::Single,
                BondKind::Double,
                BondKind::Triple,
                BondKind::Aromatic,
            ],
            bond_directions: vec![
                BondDirection::None,
                BondDirection::EndUpRight,
                BondDirection::EndDownRight,
            ],
        }
    }

    /// The shared vocabulary instance.
    pub fn shared() -> &'static FeatureVocabulary {
        static VOCABULARY: OnceLock<FeatureVocabulary> = OnceLock::new();
        VOCABULARY.get_or_init(FeatureVocabulary::new)
    }

    fn position<T: PartialEq + Debug>(
        values: &[T],
        value: &T,
        category: &'static str,
    ) -> Result<usize> {
        values
            .iter()
            .position(|candidate| candidate == value)
            .ok_or_else(|| Error::Vocabulary {
                category,
                value: format!("{value:?}"),
            })
    }

    /// Index of an atomic number (valid range 1..=118).
    pub fn atomic_number_index(&self, value: u8) -> Result<usize> {
        Self::position(&self.atomic_numbers, &value, "atomic number")
    }

    /// Index of a formal charge (valid range -5..=5).
    pub fn formal_charge_index(&self, value: i8) -> Result<usize> {
        Self::position(&self.formal_charges, &value, "formal charge")
    }

    /// Index of a chirality tag.
    pub fn chirality_index(&self, value: Chirality) -> Result<usize> {
        Self::position(&self.chirality_tags, &value, "chirality tag")
    }

    /// Index of a hybridization state.
    pub fn hybridization_index(&self, value: Hybridization) -> Result<usize> {
        Self::position(&self.hybridizations, &value, "hybridization")
    }

    /// Index of an attached-hydrogen count (valid range 0..=8).
    pub fn hydrogen_count_index(&self, value: u8) -> Result<usize> {
        Self::position(&self.hydrogen_counts, &value, "hydrogen count")
    }

    /// Index of an implicit valence (valid range 0..=6).
    pub fn implicit_valence_index(&self, value: u8) -> Result<usize> {
        Self::position(&self.implicit_valences, &value, "implicit valence")
    }

    /// Index of an atom degree (valid range 0..=10).
    pub fn degree_index(&self, value: u8) -> Result<usize> {
        Self::position(&self.degrees, &value, "degree")
    }

    /// Index of a bond kind.
    pub fn bond_kind_index(&self, value: BondKind) -> Result<usize> {
        Self::position(&self.bond_kinds, &value, "bond kind")
    }

    /// Index of a bond direction.
    pub fn bond_direction_index(&self, value: BondDirection) -> Result<usize> {
        Self::position(&self.bond_directions, &value, "bond direction")
    }

    /// Number of allowed atomic numbers (embedding table size).
    pub fn atomic_number_count(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// Number of chirality tags (embedding table size).
    pub fn chirality_count(&self) -> usize {
        self.chirality_tags.len()
    }

    /// Number of bond kinds (embedding table size).
    pub fn bond_kind_count(&self) -> usize {
        self.bond_kinds.len()
    }

    /// Number of bond directions (embedding table size).
    pub fn bond_direction_count(&self) -> usize {
        self.bond_directions.len()
    }
}
