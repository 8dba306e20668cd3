//! Atom and bond feature encoders.
//!
//! Each encoder maps one chemical entity to a fixed-length vector of
//! vocabulary indices. Encoders are pure: the same entity always encodes to
//! the same vector, and values outside the vocabulary fail the conversion.

use crate::chem::vocabulary::FeatureVocabulary;
use crate::chem::{Atom, Bond};
use crate::utils::error::Result;

/// Length of an encoded atom feature vector.
pub const ATOM_FEATURE_LEN: usize = 2;

/// Length of an encoded bond feature vector.
pub const BOND_FEATURE_LEN: usize = 2;

/// Encodes an atom as `[atomic-number index, chirality index]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomFeaturizer;

impl AtomFeaturizer {
    pub fn new() -> Self {
        Self
    }

    /// Feature vector length.
    pub fn length(&self) -> usize {
        ATOM_FEATURE_LEN
    }

    /// Encode one atom.
    pub fn convert(&self, atom: &Atom) -> Result<[i64; ATOM_FEATURE_LEN]> {
        let vocab = FeatureVocabulary::shared();
        Ok([
            vocab.atomic_number_index(atom.atomic_number)? as i64,
            vocab.chirality_index(atom.chirality)? as i64,
        ])
    }
}

/// Encodes a bond as `[bond-kind index, bond-direction index]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BondFeaturizer;

impl BondFeaturizer {
    pub fn new() -> Self {
        Self
    }

    /// Feature vector length.
    pub fn length(&self) -> usize {
        BOND_FEATURE_LEN
    }

    /// Encode one bond.
    pub fn convert(&self, bond: &Bond) -> Result<[i64; BOND_FEATURE_LEN]> {
        let vocab = FeatureVocabulary::shared();
        Ok([
            vocab.bond_kind_index(bond.kind)? as i64,
            vocab.bond_direction_index(bond.direction)? as i64,
        ])
    }
}
