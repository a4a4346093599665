use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for a stored file.
///
/// A `ContentHash` is the lowercase hex encoding of a digest of the file's
/// full byte content. Identical content always produces the same hash under
/// the same [`HashAlgorithm`](crate::HashAlgorithm); the store trusts the
/// digest's collision resistance and never compares contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hex-encode a finished digest.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a client-supplied hash string.
    ///
    /// Accepts any non-empty ASCII hex string and normalises it to lowercase.
    /// The digest length is not checked here: a well-formed but unknown hash
    /// simply resolves to nothing in the store.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHex(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Wrap a string without validation.
    ///
    /// The store itself only needs the string to be at least as long as its
    /// shard prefix; callers that accept input from clients should use
    /// [`ContentHash::parse`].
    pub fn new_unchecked(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The leading `n` characters, or `None` if the hash is shorter.
    pub fn prefix(&self, n: usize) -> Option<&str> {
        self.0.get(..n)
    }

    /// Short representation (first 8 characters).
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
