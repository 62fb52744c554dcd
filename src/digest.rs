//! Content digests for layer blobs.
//!
//! Registries address a blob by the digest of its stored (gzip) form, so the
//! uncompressed `layer.tar` bytes are streamed through a gzip encoder and the
//! SHA-256 is taken over the encoder output. Nothing is buffered beyond the
//! encoder's internal window.

use crate::error::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read, Write};

pub const DIGEST_ALGORITHM: &str = "sha256";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDigest {
    /// Lowercase hex of the SHA-256 over the compressed stream
    pub hex: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl fmt::Display for BlobDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", DIGEST_ALGORITHM, self.hex)
    }
}

/// Prefixes a bare hex digest with the algorithm name, as embedded in manifests.
pub fn qualified(hex: &str) -> String {
    format!("{}:{}", DIGEST_ALGORITHM, hex)
}

/// Write sink that hashes and counts everything written to it.
struct HashingWriter {
    hasher: Sha256,
    written: u64,
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Computes the blob digest of `reader` in a single streaming pass.
pub fn blob_digest<R: Read + ?Sized>(reader: &mut R) -> Result<BlobDigest> {
    let sink = HashingWriter {
        hasher: Sha256::new(),
        written: 0,
    };
    let mut encoder = GzEncoder::new(sink, Compression::default());
    let uncompressed_size = io::copy(reader, &mut encoder)?;
    let sink = encoder.finish()?;

    Ok(BlobDigest {
        hex: hex::encode(sink.hasher.finalize()),
        compressed_size: sink.written,
        uncompressed_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[test]
    fn test_digest_is_deterministic() {
        let data = b"layer contents that should always hash the same".repeat(64);
        let first = blob_digest(&mut data.as_slice()).unwrap();
        let second = blob_digest(&mut data.as_slice()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.hex.len(), 64);
        assert!(first
            .hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(first.uncompressed_size, data.len() as u64);
    }

    #[test]
    fn test_digest_covers_compressed_bytes() {
        let data = b"hello layer".to_vec();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let digest = blob_digest(&mut data.as_slice()).unwrap();
        assert_eq!(digest.hex, hex::encode(Sha256::digest(&compressed)));
        assert_eq!(digest.compressed_size, compressed.len() as u64);
        assert_ne!(digest.hex, hex::encode(Sha256::digest(&data)));

        // The hashed stream must still be a valid gzip of the input
        let mut roundtrip = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut roundtrip)
            .unwrap();
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn test_different_content_different_digest() {
        let a = blob_digest(&mut b"a".as_slice()).unwrap();
        let b = blob_digest(&mut b"b".as_slice()).unwrap();
        assert_ne!(a.hex, b.hex);
    }

    #[test]
    fn test_display_is_qualified() {
        let digest = blob_digest(&mut io::empty()).unwrap();
        assert_eq!(digest.to_string(), qualified(&digest.hex));
        assert!(digest.to_string().starts_with("sha256:"));
        assert_eq!(digest.uncompressed_size, 0);
    }

    #[test]
    fn test_read_failure_is_io_error() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let err = blob_digest(&mut FailingReader).unwrap_err();
        assert!(matches!(err, crate::error::ManifestError::Io(_)));
    }
}
