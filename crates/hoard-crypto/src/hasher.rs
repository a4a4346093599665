use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use sha1::Digest;

use hoard_types::{ContentHash, HashAlgorithm};

/// Read size used when streaming content through a digest (128 KiB).
pub const CHUNK_SIZE: usize = 128 * 1024;

/// Running digest state for a single hashing pass.
enum DigestState {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> ContentHash {
        match self {
            Self::Sha1(h) => ContentHash::from_digest(&h.finalize()),
            Self::Sha256(h) => ContentHash::from_digest(&h.finalize()),
            Self::Blake3(h) => ContentHash::from_digest(h.finalize().as_bytes()),
        }
    }
}

/// Streaming content hasher.
///
/// Each hashing call starts from a fresh digest state, so one hasher can be
/// used by any number of concurrent operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub const SHA1: Self = Self::new(HashAlgorithm::Sha1);
    pub const SHA256: Self = Self::new(HashAlgorithm::Sha256);
    pub const BLAKE3: Self = Self::new(HashAlgorithm::Blake3);

    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The digest algorithm used by this hasher.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash everything `reader` yields, reading [`CHUNK_SIZE`] bytes at a time.
    ///
    /// The reader is consumed to EOF and not rewound. Callers that need the
    /// bytes again must seek back to the start themselves.
    pub fn hash_reader<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<ContentHash> {
        let mut state = DigestState::new(self.algorithm);
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => state.update(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(state.finalize())
    }

    /// Hash an in-memory byte slice.
    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finalize()
    }

    /// Hash the contents of a file on disk.
    pub fn hash_file(&self, path: impl AsRef<Path>) -> io::Result<ContentHash> {
        let mut file = File::open(path)?;
        self.hash_reader(&mut file)
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash_bytes(data) == *expected
    }
}
