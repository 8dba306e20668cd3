//! Save-payload layout for trained models.
//!
//! A saved model is a string-keyed map: metadata entries (variant, task,
//! timestamp) next to a single opaque byte blob holding the full serialized
//! network. Loading requires the blob entry; a payload without it is
//! rejected outright.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Error, Result};

/// Key under which the serialized model blob is stored.
pub const MODEL_BLOB_KEY: &str = "model";

/// A single save-payload value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// String-keyed save payload: metadata entries plus the model blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavePayload {
    entries: BTreeMap<String, PayloadValue>,
}

impl SavePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a text entry.
    pub fn insert_text(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_string(), PayloadValue::Text(value.into()));
    }

    /// Insert a byte-blob entry.
    pub fn insert_bytes(&mut self, key: &str, value: Vec<u8>) {
        self.entries
            .insert(key.to_string(), PayloadValue::Bytes(value));
    }

    /// Text entry by key.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PayloadValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Byte-blob entry by key.
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(PayloadValue::Bytes(value)) => Some(value),
            _ => None,
        }
    }

    /// The model blob, required for load.
    pub fn model_blob(&self) -> Result<&[u8]> {
        self.bytes(MODEL_BLOB_KEY).ok_or_else(|| {
            Error::Serialization(format!("payload is missing the '{MODEL_BLOB_KEY}' entry"))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the payload to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a payload from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
