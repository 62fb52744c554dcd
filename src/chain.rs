//! Orders the unordered layer records into a single root-to-leaf chain.
//!
//! The walk uses a parent → child index, so the cost is linear in the number
//! of records. Branching (two children for one parent) and multiple roots are
//! always rejected since no single ordering exists for them. Records not
//! reachable from the root are handled according to [`ChainPolicy`]. Every
//! layer in the chain must have a blob digest, whatever the policy.

use crate::config::ChainPolicy;
use crate::error::{ManifestError, Result};
use crate::layer_store::LayerRecord;
use crate::notifier::Notifier;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerChain {
    /// Root first
    layers: Vec<LayerRecord>,
}

impl LayerChain {
    pub fn root_first(&self) -> &[LayerRecord] {
        &self.layers
    }

    /// Leaf first, the order used by the manifest.
    pub fn leaf_first(&self) -> impl Iterator<Item = &LayerRecord> {
        self.layers.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

pub struct ChainReconstructor<'a> {
    policy: ChainPolicy,
    notifier: &'a Notifier,
}

impl<'a> ChainReconstructor<'a> {
    pub fn new(policy: ChainPolicy, notifier: &'a Notifier) -> Self {
        Self { policy, notifier }
    }

    pub fn reconstruct(&self, records: Vec<LayerRecord>) -> Result<LayerChain> {
        let total = records.len();

        let mut roots: Vec<&LayerRecord> = records.iter().filter(|r| r.is_root()).collect();
        let root_id = match roots.len() {
            0 => return Err(ManifestError::MissingRootLayer),
            1 => roots[0].id.clone(),
            _ => {
                roots.sort_by(|a, b| a.id.cmp(&b.id));
                return Err(ManifestError::AmbiguousRoot(
                    roots.iter().map(|r| r.id.clone()).collect(),
                ));
            }
        };

        let mut by_id: HashMap<String, LayerRecord> = HashMap::with_capacity(total);
        let mut child_of: HashMap<String, String> = HashMap::with_capacity(total);
        for record in records {
            if record.has_metadata() && !record.parent_id.is_empty() {
                if let Some(sibling) = child_of.insert(record.parent_id.clone(), record.id.clone()) {
                    let (first, second) = if sibling < record.id {
                        (sibling, record.id.clone())
                    } else {
                        (record.id.clone(), sibling)
                    };
                    return Err(ManifestError::InvalidChain(format!(
                        "layer {} has more than one child ({} and {})",
                        record.parent_id, first, second
                    )));
                }
            }
            by_id.insert(record.id.clone(), record);
        }

        let mut layers = Vec::with_capacity(total);
        let mut current = Some(root_id);
        while let Some(id) = current {
            current = child_of.get(&id).cloned();
            match by_id.remove(&id) {
                Some(record) => {
                    self.notifier
                        .trace(&format!("Chain position {}: {}", layers.len(), record.id));
                    layers.push(record);
                }
                None => break,
            }
        }

        let mut blobless: Vec<&str> = layers
            .iter()
            .filter(|r| r.blob_digest.is_empty())
            .map(|r| r.id.as_str())
            .collect();
        if !blobless.is_empty() {
            blobless.sort_unstable();
            return Err(ManifestError::InvalidInput(format!(
                "no layer.tar found for layer(s) {}",
                blobless.join(", ")
            )));
        }

        if !by_id.is_empty() {
            let mut orphans: Vec<String> = by_id.into_keys().collect();
            orphans.sort();
            let message = format!(
                "{} of {} layers are not reachable from the root: {}",
                orphans.len(),
                total,
                orphans.join(", ")
            );
            match self.policy {
                ChainPolicy::Strict => return Err(ManifestError::InvalidChain(message)),
                ChainPolicy::Lenient => self.notifier.warn(&format!("Dropping {}", message)),
            }
        }

        Ok(LayerChain { layers })
    }
}
