//! Helpers that synthesize legacy `docker save` archives in memory.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use tar_rs as tar;

pub struct TestLayer {
    pub id: &'static str,
    pub parent: Option<&'static str>,
    pub blob: Vec<u8>,
}

impl TestLayer {
    pub fn new(id: &'static str, parent: Option<&'static str>) -> Self {
        Self {
            id,
            parent,
            blob: format!("filesystem changes of {}", id).repeat(32).into_bytes(),
        }
    }

    /// Layer metadata as `docker save` writes it (unsorted keys, spacing).
    pub fn json(&self) -> String {
        match self.parent {
            Some(parent) => format!(
                "{{\"id\": \"{}\", \"parent\": \"{}\", \"created\": \"2015-01-01T00:00:00Z\", \"architecture\": \"amd64\"}}",
                self.id, parent
            ),
            None => format!(
                "{{\"id\": \"{}\", \"created\": \"2015-01-01T00:00:00Z\", \"architecture\": \"amd64\"}}",
                self.id
            ),
        }
    }

    /// The same document after normalization, with the trailing newline.
    pub fn v1_compatibility(&self) -> String {
        match self.parent {
            Some(parent) => format!(
                "{{\"architecture\":\"amd64\",\"created\":\"2015-01-01T00:00:00Z\",\"id\":\"{}\",\"parent\":\"{}\"}}\n",
                self.id, parent
            ),
            None => format!(
                "{{\"architecture\":\"amd64\",\"created\":\"2015-01-01T00:00:00Z\",\"id\":\"{}\"}}\n",
                self.id
            ),
        }
    }

    pub fn blob_sum(&self) -> String {
        legacy2manifest::digest::blob_digest(&mut self.blob.as_slice())
            .unwrap()
            .to_string()
    }

    /// `VERSION`, `json`, and `layer.tar` entries for this layer.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        vec![
            (format!("{}/VERSION", self.id), b"1.0".to_vec()),
            (format!("{}/json", self.id), self.json().into_bytes()),
            (format!("{}/layer.tar", self.id), self.blob.clone()),
        ]
    }
}

pub fn repositories(name: &str, tag: &str, top: &str) -> (String, Vec<u8>) {
    (
        "repositories".to_string(),
        format!("{{\"{}\":{{\"{}\":\"{}\"}}}}", name, tag, top).into_bytes(),
    )
}

pub fn build_archive(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    build_archive_with_links(entries, &[])
}

/// Like [`build_archive`], with link entries of `(path, target, type)` appended.
pub fn build_archive_with_links(
    entries: &[(String, Vec<u8>)],
    links: &[(&str, &str, tar::EntryType)],
) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data.as_slice())
            .unwrap();
    }
    for (path, target, entry_type) in links {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(*entry_type);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, path, target).unwrap();
    }
    builder.into_inner().unwrap()
}

/// root → mid → leaf, plus a `repositories` entry for `busybox:latest`.
pub fn three_layers() -> Vec<TestLayer> {
    vec![
        TestLayer::new("aaaa", None),
        TestLayer::new("bbbb", Some("aaaa")),
        TestLayer::new("cccc", Some("bbbb")),
    ]
}

pub fn archive_entries(layers: &[TestLayer]) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    if let Some(top) = layers.last() {
        entries.push(repositories("busybox", "latest", top.id));
    }
    for layer in layers {
        entries.extend(layer.entries());
    }
    entries
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(bytes).unwrap();
}
