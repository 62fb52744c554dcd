//! End-to-end "legacy export → manifest" pipeline.
//!
//! [`ManifestProcessor`] walks the archive once, digesting each `layer.tar`
//! and collecting each layer's `json` into a [`LayerStore`], orders the
//! records into a chain, and assembles (and optionally signs) the manifest.
//!
//! Construction helpers:
//! - [`ManifestProcessor::new`] — build from a [`Config`] and a [`Notifier`], loading the
//!   signing key if one is set.
//! - [`ManifestProcessor::with_signer`] — inject any [`ManifestSigner`].

use crate::archive_walker::{ArchiveWalker, EntryHandler};
use crate::chain::ChainReconstructor;
use crate::config::Config;
use crate::digest;
use crate::error::Result;
use crate::layer_store::{LayerFields, LayerMetadata, LayerStore};
use crate::manifest::Manifest;
use crate::notifier::Notifier;
use crate::repository::RepositoryIdentity;
use crate::signing::{JwsSigner, ManifestSigner};
use std::fs::File;
use std::io::Read;

/// Folds archive entries into layer records and the repository identity.
struct LayerCollector<'a> {
    store: LayerStore,
    identity: Option<RepositoryIdentity>,
    /// `(layer, target)` pairs whose blob is a link to the target's blob
    blob_links: Vec<(String, String)>,
    notifier: &'a Notifier,
}

impl LayerCollector<'_> {
    /// Copies the digest of each link target onto the linking layer.
    ///
    /// Links may point at layers that come later in the archive or at other
    /// links, so this runs after the walk and repeats until nothing changes.
    /// Links that still have no digest are left for the chain check to report.
    fn resolve_blob_links(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.blob_links);
        loop {
            let before = pending.len();
            let mut unresolved = Vec::new();
            for (layer_id, target_id) in pending {
                let digest = self
                    .store
                    .get(&target_id)
                    .map(|target| target.blob_digest.clone())
                    .unwrap_or_default();
                if digest.is_empty() {
                    unresolved.push((layer_id, target_id));
                } else {
                    self.store.merge(&layer_id, LayerFields::blob(digest))?;
                }
            }
            pending = unresolved;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for (layer_id, target_id) in pending {
            self.notifier.warn(&format!(
                "Layer {} links to the blob of layer {}, which is not in the archive",
                layer_id, target_id
            ));
        }
        Ok(())
    }
}

impl EntryHandler for LayerCollector<'_> {
    fn blob(&mut self, layer_id: &str, reader: &mut dyn Read) -> Result<()> {
        let digest = digest::blob_digest(reader)?;
        self.notifier.debug(&format!(
            "Layer {}: {} ({} bytes, {} compressed)",
            layer_id, digest, digest.uncompressed_size, digest.compressed_size
        ));
        self.store.merge(layer_id, LayerFields::blob(digest.hex))
    }

    fn blob_link(&mut self, layer_id: &str, target_id: &str) -> Result<()> {
        self.blob_links
            .push((layer_id.to_string(), target_id.to_string()));
        Ok(())
    }

    fn metadata(&mut self, layer_id: &str, bytes: &[u8]) -> Result<()> {
        let metadata = match LayerMetadata::parse(bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.notifier
                    .warn(&format!("Ignoring metadata of layer {}: {}", layer_id, e));
                return Ok(());
            }
        };

        if metadata.id != layer_id {
            self.notifier.warn(&format!(
                "Layer directory {} holds metadata for layer {}",
                layer_id, metadata.id
            ));
        }
        self.store.merge(
            &metadata.id,
            LayerFields::metadata(metadata.parent_id, metadata.json),
        )
    }

    fn repositories(&mut self, bytes: &[u8]) -> Result<()> {
        match RepositoryIdentity::parse(bytes) {
            Some(identity) => {
                self.notifier.debug(&format!(
                    "Repository: {}:{}",
                    identity.name, identity.tag
                ));
                self.identity = Some(identity);
            }
            None => {
                self.notifier
                    .warn("Malformed repositories entry, name and tag will be empty");
                self.identity = Some(RepositoryIdentity::default());
            }
        }
        Ok(())
    }
}

pub struct ManifestProcessor {
    config: Config,
    notifier: Notifier,
    signer: Option<Box<dyn ManifestSigner>>,
}

impl ManifestProcessor {
    /// Loads the signing key up front, so a bad key fails before the archive is read.
    pub fn new(config: Config, notifier: Notifier) -> Result<Self> {
        let signer: Option<Box<dyn ManifestSigner>> = match &config.key_path {
            Some(path) => {
                notifier.debug(&format!("Loading signing key: {}", path.display()));
                let signer = JwsSigner::from_file(path)?;
                notifier.info(&format!("Signing with key {}", signer.key_id()));
                Some(Box::new(signer))
            }
            None => None,
        };

        Ok(Self {
            config,
            notifier,
            signer,
        })
    }

    pub fn with_signer(mut self, signer: Box<dyn ManifestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Opens the configured archive and returns the rendered manifest.
    ///
    /// Nothing is returned unless every step, signing included, succeeded.
    pub fn generate(&self) -> Result<Vec<u8>> {
        let path = &self.config.archive_path;
        self.notifier
            .info(&format!("Reading image archive: {}", path.display()));

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if ![".tar", ".tar.gz", ".tgz"]
            .iter()
            .any(|ext| file_name.ends_with(ext))
        {
            self.notifier.warn("File does not have a .tar extension. Proceeding anyway, but this might not be a valid image archive.");
        }

        let manifest = {
            let file = File::open(path)?;
            self.build_manifest(file)?
        };
        let output = self.render(&manifest)?;

        self.notifier.finish();
        Ok(output)
    }

    /// Walks an archive stream and assembles its manifest.
    pub fn build_manifest<R: Read>(&self, reader: R) -> Result<Manifest> {
        let mut collector = LayerCollector {
            store: LayerStore::new(),
            identity: None,
            blob_links: Vec::new(),
            notifier: &self.notifier,
        };
        ArchiveWalker::new(&self.notifier).walk(reader, &mut collector)?;
        collector.resolve_blob_links()?;

        let LayerCollector {
            store, identity, ..
        } = collector;
        self.notifier
            .debug(&format!("Collected {} layer records", store.len()));

        let chain = ChainReconstructor::new(self.config.chain_policy, &self.notifier)
            .reconstruct(store.all().into_iter().cloned().collect())?;
        self.notifier
            .info(&format!("Ordered {} layers", chain.len()));

        let identity = identity.unwrap_or_else(|| {
            self.notifier
                .warn("No repositories entry found, name and tag will be empty");
            RepositoryIdentity::default()
        });

        Ok(Manifest::assemble(
            &identity,
            &self.config.architecture,
            &chain,
        ))
    }

    /// Plain indented JSON, or the signed envelope when a signer is set.
    pub fn render(&self, manifest: &Manifest) -> Result<Vec<u8>> {
        let payload = manifest.to_canonical_json()?;
        let mut output = match &self.signer {
            Some(signer) => {
                self.notifier.info("Signing manifest");
                signer.sign(&payload)?
            }
            None => payload,
        };
        output.push(b'\n');
        Ok(output)
    }
}
