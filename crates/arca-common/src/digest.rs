//! Single-pass multi-algorithm digest computation
//!
//! Bag contents are often read from a forward-only tar stream, so every
//! byte must be consumed exactly once while feeding all enabled hashes.

use std::io::Read;
use std::path::Path;

use md5::Context as Md5Context;
use sha2::{Digest, Sha256};

use crate::constants::DigestAlgorithm;
use crate::error::Result;

/// md5 of zero bytes.
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// sha256 of zero bytes.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hex digests produced by one pass over a reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSet {
    pub md5: Option<String>,
    pub sha256: Option<String>,
}

impl DigestSet {
    /// Digest for the given algorithm, if it was enabled.
    pub fn get(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        match algorithm {
            DigestAlgorithm::Md5 => self.md5.as_deref(),
            DigestAlgorithm::Sha256 => self.sha256.as_deref(),
        }
    }
}

/// Consume the reader exactly once, feeding every enabled hash.
///
/// The reader is drained fully even when `algorithms` is empty, so a tar
/// entry always advances to its end.
pub fn compute_digests<R: Read>(
    reader: &mut R,
    algorithms: &[DigestAlgorithm],
) -> Result<DigestSet> {
    let mut md5_ctx = algorithms
        .contains(&DigestAlgorithm::Md5)
        .then(Md5Context::new);
    let mut sha256_hasher = algorithms
        .contains(&DigestAlgorithm::Sha256)
        .then(Sha256::new);

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        if let Some(ctx) = md5_ctx.as_mut() {
            ctx.consume(&buffer[..bytes_read]);
        }
        if let Some(hasher) = sha256_hasher.as_mut() {
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(DigestSet {
        md5: md5_ctx.map(|ctx| format!("{:x}", ctx.compute())),
        sha256: sha256_hasher.map(|hasher| hex::encode(hasher.finalize())),
    })
}

/// Compute digests for a file on disk.
pub fn compute_file_digests(
    path: impl AsRef<Path>,
    algorithms: &[DigestAlgorithm],
) -> Result<DigestSet> {
    let mut file = std::fs::File::open(path)?;
    compute_digests(&mut file, algorithms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BOTH: &[DigestAlgorithm] = &[DigestAlgorithm::Md5, DigestAlgorithm::Sha256];

    #[test]
    fn computes_both_digests_in_one_pass() {
        let mut cursor = Cursor::new(b"hello world");
        let digests = compute_digests(&mut cursor, BOTH).unwrap();
        assert_eq!(
            digests.md5.as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert_eq!(
            digests.sha256.as_deref(),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
    }

    #[test]
    fn zero_byte_input_yields_canonical_empty_digests() {
        let mut cursor = Cursor::new(b"");
        let digests = compute_digests(&mut cursor, BOTH).unwrap();
        assert_eq!(digests.md5.as_deref(), Some(EMPTY_MD5));
        assert_eq!(digests.sha256.as_deref(), Some(EMPTY_SHA256));
    }

    #[test]
    fn drains_reader_even_with_no_algorithms() {
        let mut cursor = Cursor::new(vec![7u8; 64 * 1024]);
        let digests = compute_digests(&mut cursor, &[]).unwrap();
        assert_eq!(digests, DigestSet::default());
        assert_eq!(cursor.position(), 64 * 1024);
    }

    #[test]
    fn single_algorithm_leaves_the_other_unset() {
        let mut cursor = Cursor::new(b"payload");
        let digests = compute_digests(&mut cursor, &[DigestAlgorithm::Sha256]).unwrap();
        assert!(digests.md5.is_none());
        assert!(digests.sha256.is_some());
        assert_eq!(digests.get(DigestAlgorithm::Md5), None);
    }
}
