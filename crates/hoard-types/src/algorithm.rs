use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Digest function used to compute content hashes.
///
/// The default is SHA-1, a 160-bit digest rendered as 40 hex characters.
/// Changing the algorithm of an existing store makes previously stored
/// objects unreachable under their old hashes; a store is expected to keep
/// one algorithm for its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Blake3 => 32,
        }
    }

    /// Length of the hex-encoded digest.
    pub const fn hex_len(self) -> usize {
        self.digest_len() * 2
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(TypeError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sha1() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha1);
        assert_eq!(HashAlgorithm::Sha1.hex_len(), 40);
    }

    #[test]
    fn hex_lengths() {
        assert_eq!(HashAlgorithm::Sha256.hex_len(), 64);
        assert_eq!(HashAlgorithm::Blake3.hex_len(), 64);
    }

    #[test]
    fn parse_names() {
        assert_eq!("sha1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(TypeError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&HashAlgorithm::Sha256).unwrap();
        assert_eq!(json, "\"sha256\"");
        let parsed: HashAlgorithm = serde_json::from_str("\"blake3\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Blake3);
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(HashAlgorithm::Blake3.to_string(), "blake3");
    }
}
