pub mod archive_walker;
pub mod chain;
pub mod config;
pub mod digest;
pub mod error;
pub mod layer_store;
pub mod manifest;
pub mod notifier;
pub mod processor;
pub mod repository;
pub mod signing;

// Re-exports for easy access
pub use config::{ChainPolicy, Config};
pub use error::{ManifestError, Result};
pub use manifest::Manifest;
pub use notifier::Notifier;
pub use processor::ManifestProcessor;
pub use signing::{JwsSigner, ManifestSigner};
