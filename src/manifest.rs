//! Schema 1 manifest document.
//!
//! `fsLayers` and `history` are parallel arrays ordered leaf first: entry `i`
//! of both describes the same layer.

use crate::chain::LayerChain;
use crate::digest;
use crate::error::Result;
use crate::repository::RepositoryIdentity;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

pub const SCHEMA_VERSION: u32 = 1;

/// Indentation of the rendered document; the signature envelope depends on it.
pub const INDENT: &[u8] = b"   ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub name: String,
    pub tag: String,
    pub architecture: String,
    #[serde(rename = "fsLayers")]
    pub fs_layers: Vec<FsLayer>,
    pub history: Vec<History>,
}

impl Manifest {
    pub fn assemble(identity: &RepositoryIdentity, architecture: &str, chain: &LayerChain) -> Self {
        let (fs_layers, history): (Vec<FsLayer>, Vec<History>) = chain
            .leaf_first()
            .map(|record| {
                (
                    FsLayer {
                        blob_sum: digest::qualified(&record.blob_digest),
                    },
                    History {
                        v1_compatibility: format!("{}\n", record.metadata_json),
                    },
                )
            })
            .unzip();

        Self {
            schema_version: SCHEMA_VERSION,
            name: identity.name.clone(),
            tag: identity.tag.clone(),
            architecture: architecture.to_string(),
            fs_layers,
            history,
        }
    }

    /// Indented JSON without a trailing newline. This is also the payload the
    /// signer sees.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
        self.serialize(&mut serializer)?;
        Ok(buf)
    }
}
