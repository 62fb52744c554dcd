//! Error taxonomy for the manifest pipeline.
//!
//! Every pipeline-fatal condition is a [`ManifestError`] variant. Entry-local
//! problems (an unparsable `json` or `repositories` entry) never surface here;
//! they are logged and the affected fields stay empty.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    /// Opening or reading the archive (or a blob inside it) failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The tar framing itself is broken
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("unable to find root layer")]
    MissingRootLayer,

    /// More than one layer claims to be the base of the image
    #[error("ambiguous root: layers {0:?} all have no parent")]
    AmbiguousRoot(Vec<String>),

    #[error("invalid layer chain: {0}")]
    InvalidChain(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load signing key: {0}")]
    KeyLoad(String),

    #[error("failed to sign manifest: {0}")]
    Signing(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ManifestError {
    /// Process exit status for this error kind. Zero is reserved for success
    /// and one for failures outside the pipeline (argument parsing, stdout).
    pub fn exit_code(&self) -> u8 {
        match self {
            ManifestError::Io(_) => 3,
            ManifestError::CorruptArchive(_) => 4,
            ManifestError::MissingRootLayer => 5,
            ManifestError::AmbiguousRoot(_) => 6,
            ManifestError::InvalidChain(_) => 7,
            ManifestError::InvalidInput(_) => 8,
            ManifestError::KeyLoad(_) => 9,
            ManifestError::Signing(_) => 10,
            ManifestError::Serialization(_) => 11,
        }
    }
}
