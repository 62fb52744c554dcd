//! Single-pass traversal of a legacy image export.
//!
//! A `docker save` archive in the legacy layout looks like:
//!
//! ```text
//! repositories
//! <layer id>/VERSION
//! <layer id>/json
//! <layer id>/layer.tar
//! ```
//!
//! Each entry is classified by name and its payload handed to an
//! [`EntryHandler`] exactly once before the walker advances. Plain and
//! gzip-compressed archives are both accepted.
//!
//! When two layers have identical contents, `docker save` stores the blob once
//! and writes the other `layer.tar` as a link to it
//! (`<id>/layer.tar -> ../<other id>/layer.tar`). Such entries are reported as
//! [`EntryKind::BlobLink`] so the handler can reuse the target's digest.

use crate::error::{ManifestError, Result};
use crate::notifier::Notifier;
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar_rs as tar;

pub const BLOB_FILENAME: &str = "layer.tar";
pub const METADATA_FILENAME: &str = "json";
pub const REPOSITORIES_FILENAME: &str = "repositories";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Blob { layer_id: String },
    /// `layer.tar` of `layer_id` is a symlink or hard link to the blob of `target_id`
    BlobLink { layer_id: String, target_id: String },
    Metadata { layer_id: String },
    Repositories,
    Ignored,
}

/// Receives classified entries in archive order.
pub trait EntryHandler {
    fn blob(&mut self, layer_id: &str, reader: &mut dyn Read) -> Result<()>;
    fn blob_link(&mut self, layer_id: &str, target_id: &str) -> Result<()>;
    fn metadata(&mut self, layer_id: &str, bytes: &[u8]) -> Result<()>;
    fn repositories(&mut self, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub entries: usize,
    pub blobs: usize,
    pub blob_links: usize,
    pub metadata: usize,
    pub ignored: usize,
}

/// Normalizes a path from a tar archive: drops `.` and any root, and lets
/// `..` pop instead of escaping.
fn normalize_tar_path(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    out
}

/// Name of the directory holding the entry, i.e. the layer id.
fn layer_id_of(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()?
        .to_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Classifies an entry by its path inside the archive.
pub fn classify(path: &Path) -> EntryKind {
    let path = normalize_tar_path(path);

    if path == Path::new(REPOSITORIES_FILENAME) {
        return EntryKind::Repositories;
    }

    let file_name = path.file_name().and_then(|n| n.to_str());
    match (file_name, layer_id_of(&path)) {
        (Some(BLOB_FILENAME), Some(layer_id)) => EntryKind::Blob { layer_id },
        (Some(METADATA_FILENAME), Some(layer_id)) => EntryKind::Metadata { layer_id },
        _ => EntryKind::Ignored,
    }
}

/// Classifies a link entry. Only a `layer.tar` pointing at another layer's
/// `layer.tar` is of interest; symlink targets are relative to the link's
/// directory, hard link targets to the archive root.
pub fn classify_link(path: &Path, target: &Path, symbolic: bool) -> EntryKind {
    let target = match (symbolic, path.parent()) {
        (true, Some(dir)) => dir.join(target),
        _ => target.to_path_buf(),
    };

    match (classify(path), classify(&target)) {
        (EntryKind::Blob { layer_id }, EntryKind::Blob { layer_id: target_id })
            if layer_id != target_id =>
        {
            EntryKind::BlobLink {
                layer_id,
                target_id,
            }
        }
        _ => EntryKind::Ignored,
    }
}

/// Wraps `reader` in a gzip decoder if the stream starts with the gzip magic.
fn decompressing_reader<'a, R: Read + 'a>(reader: R) -> Result<Box<dyn Read + 'a>> {
    let mut buf_reader = BufReader::new(reader);
    let is_gzip = buf_reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(GzDecoder::new(buf_reader)))
    } else {
        Ok(Box::new(buf_reader))
    }
}

fn corrupt(err: std::io::Error) -> ManifestError {
    ManifestError::CorruptArchive(err.to_string())
}

pub struct ArchiveWalker<'a> {
    notifier: &'a Notifier,
}

impl<'a> ArchiveWalker<'a> {
    pub fn new(notifier: &'a Notifier) -> Self {
        Self { notifier }
    }

    /// Streams every entry of `reader` through `handler`.
    pub fn walk<R: Read, H: EntryHandler>(&self, reader: R, handler: &mut H) -> Result<WalkStats> {
        let mut archive = tar::Archive::new(decompressing_reader(reader)?);
        let mut stats = WalkStats::default();

        for entry_result in archive.entries().map_err(corrupt)? {
            let mut entry = entry_result.map_err(corrupt)?;
            stats.entries += 1;

            let path = entry.path().map_err(corrupt)?.into_owned();
            let entry_type = entry.header().entry_type();
            let kind = if entry_type.is_file() {
                classify(&path)
            } else if entry_type.is_symlink() || entry_type.is_hard_link() {
                match entry.link_name().map_err(corrupt)? {
                    Some(target) => classify_link(&path, &target, entry_type.is_symlink()),
                    None => EntryKind::Ignored,
                }
            } else {
                EntryKind::Ignored
            };
            self.notifier
                .trace(&format!("Entry {}: {:?}", path.display(), kind));

            match kind {
                EntryKind::Blob { layer_id } => {
                    self.notifier.info(&format!("Digesting layer {}", layer_id));
                    handler.blob(&layer_id, &mut entry)?;
                    stats.blobs += 1;
                }
                EntryKind::BlobLink {
                    layer_id,
                    target_id,
                } => {
                    self.notifier
                        .debug(&format!("Layer {} shares the blob of {}", layer_id, target_id));
                    handler.blob_link(&layer_id, &target_id)?;
                    stats.blob_links += 1;
                }
                EntryKind::Metadata { layer_id } => {
                    let mut bytes = Vec::new();
                    entry.read_to_end(&mut bytes)?;
                    handler.metadata(&layer_id, &bytes)?;
                    stats.metadata += 1;
                }
                EntryKind::Repositories => {
                    let mut bytes = Vec::new();
                    entry.read_to_end(&mut bytes)?;
                    handler.repositories(&bytes)?;
                }
                EntryKind::Ignored => {
                    stats.ignored += 1;
                }
            }
        }

        self.notifier.debug(&format!(
            "Walked {} entries: {} blobs, {} blob links, {} metadata, {} ignored",
            stats.entries, stats.blobs, stats.blob_links, stats.metadata, stats.ignored
        ));
        Ok(stats)
    }
}
