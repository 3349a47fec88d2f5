use std::fmt;
use thiserror::Error;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as Sha2Digest, Sha224, Sha256, Sha384, Sha512};

/// Checksum algorithm, per spec §3.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Error)]
#[error("unknown checksum algorithm: {0:?}")]
pub struct UnknownAlgorithm(String);

impl ChecksumAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    pub fn parse(name: &str) -> Result<Self, UnknownAlgorithm> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }

    /// Digest `data` with this algorithm, returning the lowercase hex digest.
    pub fn digest_hex(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Sha224 => hex::encode(Sha224::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

/// A (algorithm, hex-digest) pair. Equality is by algorithm and
/// lowercase digest (spec §3.1).
#[derive(Clone, Debug)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    digest: String,
}

impl Checksum {
    pub fn new(algorithm: ChecksumAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into().to_ascii_lowercase(),
        }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Compute the checksum of `data` and compare it against this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.algorithm.digest_hex(data) == self.digest
    }

    pub fn of(algorithm: ChecksumAlgorithm, data: &[u8]) -> Self {
        Self::new(algorithm, algorithm.digest_hex(data))
    }
}

impl PartialEq for Checksum {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.digest == other.digest
    }
}
impl Eq for Checksum {}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_case_insensitive_on_digest() {
        let a = Checksum::new(ChecksumAlgorithm::Sha256, "ABCDEF");
        let b = Checksum::new(ChecksumAlgorithm::Sha256, "abcdef");
        assert_eq!(a, b);
    }

    #[test]
    fn different_algorithm_same_digest_are_not_equal() {
        let a = Checksum::new(ChecksumAlgorithm::Sha1, "abc");
        let b = Checksum::new(ChecksumAlgorithm::Sha256, "abc");
        assert_ne!(a, b);
    }

    #[test]
    fn matches_recomputes_digest() {
        let sum = Checksum::of(ChecksumAlgorithm::Sha256, b"hello world");
        assert!(sum.matches(b"hello world"));
        assert!(!sum.matches(b"goodbye world"));
    }
}
