//! Content-addressed blob identifiers.
//!
//! A `BlobRef` has the canonical string form `<algo>-<hex digest>`, e.g.
//! `sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709`. Equality is string equality.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::PosixError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlobRef {
    algo: String,
    digest: String,
}

/// A BlobRef paired with the size of the blob it names, as returned by upload/receive calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedBlobRef {
    pub blob_ref: BlobRef,
    pub size: u64,
}

const KNOWN_ALGOS: &[(&str, usize)] = &[("sha1", 40), ("sha224", 56), ("sha256", 64)];

impl BlobRef {
    pub fn algo(&self) -> &str {
        &self.algo
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The canonical string form, e.g. `sha1-da39a3ee...`.
    pub fn as_str(&self) -> String {
        format!("{}-{}", self.algo, self.digest)
    }

    /// A stable 64-bit digest of the canonical string, used as the FUSE inode number
    /// for any node identified by this BlobRef.
    pub fn sum64(&self) -> u64 {
        sum64_str(&self.as_str())
    }

    /// Construct directly from known-valid parts, skipping validation. Used for tests and
    /// for blob refs synthesized in-process (e.g. the fixed stub entry in the root directory).
    pub fn new_unchecked(algo: impl Into<String>, digest: impl Into<String>) -> Self {
        BlobRef {
            algo: algo.into(),
            digest: digest.into(),
        }
    }
}

impl Hash for BlobRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BlobRef {
    type Err = PosixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((algo, digest)) = s.split_once('-') else {
            return Err(PosixError::invalid(format!("malformed blobref {s:?}")));
        };
        let expected_len = KNOWN_ALGOS
            .iter()
            .find(|(name, _)| *name == algo)
            .map(|(_, len)| *len)
            .ok_or_else(|| PosixError::invalid(format!("unknown hash algorithm in {s:?}")))?;
        if digest.len() != expected_len || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PosixError::invalid(format!("malformed digest in {s:?}")));
        }
        if digest.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(PosixError::invalid(format!(
                "digest must be lower-case hex in {s:?}"
            )));
        }
        Ok(BlobRef {
            algo: algo.to_string(),
            digest: digest.to_string(),
        })
    }
}

/// Computes the sha1 blob ref of `data`, as produced by the mutable-file flush path when it
/// hands a freshly-assembled file blob to the blob store client.
pub fn sha1_blob_ref(data: &[u8]) -> BlobRef {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    let digest = hasher.finalize();
    BlobRef {
        algo: "sha1".to_string(),
        digest: hex::encode(digest),
    }
}

/// A stable 64-bit digest of an arbitrary string, used both for BlobRef::sum64 and for
/// synthesizing inode numbers from a node's full path.
pub fn sum64_str(s: &str) -> u64 {
    // FNV-1a: simple, dependency-free, stable across process runs (no random seeding).
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    // Inode 0 is reserved; never return it.
    if hash == 0 {
        1
    } else {
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_sha1() {
        let s = "sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let br: BlobRef = s.parse().unwrap();
        assert_eq!(br.algo(), "sha1");
        assert_eq!(br.as_str(), s);
    }

    #[test]
    fn rejects_malformed() {
        assert!("not-a-blobref".parse::<BlobRef>().is_err());
        assert!("sha1-tooshort".parse::<BlobRef>().is_err());
        assert!("sha1-DA39A3EE5E6B4B0D3255BFEF95601890AFD80709"
            .parse::<BlobRef>()
            .is_err());
        assert!("md5-da39a3ee5e6b4b0d3255bfef95601890afd80709"
            .parse::<BlobRef>()
            .is_err());
    }

    #[test]
    fn sum64_is_stable_for_equal_refs() {
        let a: BlobRef = "sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709"
            .parse()
            .unwrap();
        let b = a.clone();
        assert_eq!(a.sum64(), b.sum64());
        // Different process runs must agree too: no randomness in the hash.
        assert_eq!(a.sum64(), sum64_str(&a.as_str()));
    }

    #[test]
    fn sha1_blob_ref_matches_known_vector() {
        let br = sha1_blob_ref(b"");
        assert_eq!(br.as_str(), "sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
