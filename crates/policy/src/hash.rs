//! Hash sources for inline scripts and styles.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::PolicyError;

/// Hash algorithms allowed in a hash source expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Quoted hash source ready to append to a source list, e.g. `'sha256-...'`
    pub fn source_expression(&self, data: &[u8]) -> String {
        format!("'{}'", calculate_hash(data, *self))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == s)
            .ok_or_else(|| PolicyError::UnsupportedHashAlgorithm(s.to_string()))
    }
}

/// Hash `data`, returning `<algorithm>-<base64 digest>`.
pub fn calculate_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    format!("{}-{}", algorithm, general_purpose::STANDARD.encode(algorithm.digest(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash() {
        assert_eq!(
            calculate_hash(b"alert('Hello, world.');", HashAlgorithm::Sha256),
            "sha256-qznLcsROx4GACP2dm0UCKCzCG+HiZ1guq6ZZDob/Tng="
        );
    }

    #[test]
    fn test_hash_prefix_and_length() {
        let sha384 = calculate_hash(b"body { color: red; }", HashAlgorithm::Sha384);
        assert!(sha384.starts_with("sha384-"));
        assert_eq!(sha384.len(), "sha384-".len() + 64);

        let sha512 = calculate_hash(b"body { color: red; }", HashAlgorithm::Sha512);
        assert!(sha512.starts_with("sha512-"));
        assert_eq!(sha512.len(), "sha512-".len() + 88);
    }

    #[test]
    fn test_source_expression_is_quoted() {
        let source = HashAlgorithm::Sha256.source_expression(b"alert('Hello, world.');");
        assert_eq!(source, "'sha256-qznLcsROx4GACP2dm0UCKCzCG+HiZ1guq6ZZDob/Tng='");
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("sha384".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha384);
        assert_eq!(
            "md5".parse::<HashAlgorithm>().unwrap_err(),
            PolicyError::UnsupportedHashAlgorithm("md5".to_string())
        );
    }
}
