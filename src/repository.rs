//! Image name and tag from the export's `repositories` entry.
//!
//! The entry looks like `{"busybox": {"latest": "<layer id>"}}`. Unqualified
//! names get the default registry namespace, so `busybox` becomes
//! `library/busybox`.

use serde_json::{Map, Value};

pub const DEFAULT_NAMESPACE: &str = "library";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryIdentity {
    pub name: String,
    pub tag: String,
}

impl RepositoryIdentity {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: qualify_name(&name.into()),
            tag: tag.into(),
        }
    }

    /// Parses the `repositories` document.
    ///
    /// Only one repository with one tag is expected; if there are more, the
    /// first key in each object is used. Returns `None` when the document is
    /// not of that shape.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let repositories: Map<String, Value> = serde_json::from_slice(bytes).ok()?;
        let (name, tags) = repositories.into_iter().next()?;
        let tag = match tags {
            Value::Object(tags) => tags.keys().next().cloned().unwrap_or_default(),
            _ => return None,
        };
        Some(Self::new(name, tag))
    }
}

/// Adds the default namespace to a repository name without a `/`.
pub fn qualify_name(name: &str) -> String {
    if name.is_empty() || name.contains('/') {
        name.to_string()
    } else {
        format!("{}/{}", DEFAULT_NAMESPACE, name)
    }
}
