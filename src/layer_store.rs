//! Identifier-keyed collection of partially populated layer records.
//!
//! A layer's `layer.tar` and `json` entries can arrive in any order, so each
//! record starts with whatever the first entry provides and is completed in
//! place by the other one. Fields are never clobbered: writing an empty value
//! is a no-op, and writing a different non-empty value is rejected.

use crate::error::{ManifestError, Result};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerRecord {
    pub id: String,
    /// Empty for the base layer
    pub parent_id: String,
    /// Bare hex digest of the compressed blob
    pub blob_digest: String,
    /// Re-serialized layer metadata
    pub metadata_json: String,
}

impl LayerRecord {
    /// Without its metadata entry a record's parent linkage is unknown.
    pub fn has_metadata(&self) -> bool {
        !self.metadata_json.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.has_metadata() && self.parent_id.is_empty()
    }
}

/// Fields supplied by a single archive entry.
#[derive(Debug, Clone, Default)]
pub struct LayerFields {
    pub parent_id: Option<String>,
    pub blob_digest: Option<String>,
    pub metadata_json: Option<String>,
}

impl LayerFields {
    pub fn blob(digest: impl Into<String>) -> Self {
        Self {
            blob_digest: Some(digest.into()),
            ..Default::default()
        }
    }

    pub fn metadata(parent_id: impl Into<String>, metadata_json: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            metadata_json: Some(metadata_json.into()),
            ..Default::default()
        }
    }
}

/// The two fields of a layer's `json` entry the chain depends on.
#[derive(Debug, Deserialize)]
struct LayerInfo {
    id: Option<String>,
    #[serde(default)]
    parent: Option<String>,
}

/// A decoded `json` entry: identity, linkage, and the normalized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMetadata {
    pub id: String,
    pub parent_id: String,
    pub json: String,
}

impl LayerMetadata {
    /// Decodes a layer `json` entry.
    ///
    /// Malformed JSON is a [`ManifestError::Serialization`]; a document with no
    /// `id` is [`ManifestError::InvalidInput`]. A missing, null, or empty
    /// `parent` marks the base layer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let info = LayerInfo::deserialize(&value)?;

        let id = info
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ManifestError::InvalidInput("layer metadata has no \"id\" field".to_string()))?;

        Ok(Self {
            id,
            parent_id: info.parent.unwrap_or_default(),
            json: serde_json::to_string(&value)?,
        })
    }
}

#[derive(Debug, Default)]
pub struct LayerStore {
    records: HashMap<String, LayerRecord>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the record for `id` if absent, then applies each supplied field.
    pub fn merge(&mut self, id: &str, fields: LayerFields) -> Result<()> {
        if id.is_empty() {
            return Err(ManifestError::InvalidInput(
                "layer id must not be empty".to_string(),
            ));
        }

        let record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| LayerRecord {
                id: id.to_string(),
                ..Default::default()
            });

        merge_field(id, "parent", &mut record.parent_id, fields.parent_id)?;
        merge_field(id, "blob digest", &mut record.blob_digest, fields.blob_digest)?;
        merge_field(id, "metadata", &mut record.metadata_json, fields.metadata_json)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&LayerRecord> {
        self.records.get(id)
    }

    /// All records, in no particular order.
    pub fn all(&self) -> Vec<&LayerRecord> {
        self.records.values().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn merge_field(id: &str, name: &str, slot: &mut String, value: Option<String>) -> Result<()> {
    match value {
        None => Ok(()),
        Some(value) if value.is_empty() => Ok(()),
        Some(value) if slot.is_empty() => {
            *slot = value;
            Ok(())
        }
        Some(value) if *slot == value => Ok(()),
        Some(value) => Err(ManifestError::InvalidInput(format!(
            "conflicting {} for layer {}: {:?} vs {:?}",
            name, id, slot, value
        ))),
    }
}
