use std::path::{Path, PathBuf};

pub const DEFAULT_ARCHITECTURE: &str = "amd64";

/// What to do with layers that cannot be reached by walking from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainPolicy {
    /// Drop unreachable layers and log a warning for each
    #[default]
    Lenient,
    /// Fail with `InvalidChain`
    Strict,
}

/// Pipeline configuration, built once by the CLI and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub archive_path: PathBuf,
    pub key_path: Option<PathBuf>,
    pub verbosity: u8,
    pub chain_policy: ChainPolicy,
    pub architecture: String,
}

impl Config {
    pub fn new<P: AsRef<Path>>(archive_path: P) -> Self {
        Self {
            archive_path: archive_path.as_ref().to_path_buf(),
            key_path: None,
            verbosity: 0,
            chain_policy: ChainPolicy::default(),
            architecture: DEFAULT_ARCHITECTURE.to_string(),
        }
    }

    pub fn with_key<P: AsRef<Path>>(mut self, key_path: P) -> Self {
        self.key_path = Some(key_path.as_ref().to_path_buf());
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_chain_policy(mut self, policy: ChainPolicy) -> Self {
        self.chain_policy = policy;
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }
}
