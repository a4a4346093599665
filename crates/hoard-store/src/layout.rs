use std::path::{Path, PathBuf};

use hoard_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Directory under the root that holds uploads still being written.
///
/// The leading dot keeps it out of the hex shard namespace.
pub const STAGING_DIR: &str = ".staging";

/// Suffix of in-flight upload files in [`STAGING_DIR`].
pub const STAGING_SUFFIX: &str = "part";

/// Pure path arithmetic for the on-disk layout.
///
/// ```text
/// <root>/
/// ├── .staging/
/// │   └── <hash>.<uuid>.part      # upload in progress
/// └── <hash[0:N]>/
///     └── <hash>.<extension>      # stored object
/// ```
///
/// No filesystem access happens here.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    shard_len: usize,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>, shard_len: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            shard_len,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shard_len(&self) -> usize {
        self.shard_len
    }

    /// The shard directory name: the first `shard_len` characters of `hash`.
    ///
    /// Fails with [`StoreError::InvalidHash`] if the hash is too short, or if
    /// it could address something outside the shard namespace (path
    /// separators, NUL, or a leading dot).
    pub fn shard_name<'a>(&self, hash: &'a ContentHash) -> StoreResult<&'a str> {
        let s = hash.as_str();
        let escapes = s.starts_with('.') || s.contains(['/', '\\', '\0']);
        match hash.prefix(self.shard_len) {
            Some(prefix) if !escapes => Ok(prefix),
            _ => Err(StoreError::InvalidHash {
                hash: s.to_string(),
                shard_len: self.shard_len,
            }),
        }
    }

    /// `root / hash[0:N]`.
    pub fn shard_dir(&self, hash: &ContentHash) -> StoreResult<PathBuf> {
        Ok(self.root.join(self.shard_name(hash)?))
    }

    /// `shard_dir(hash) / hash[.extension]`.
    pub fn object_path(&self, hash: &ContentHash, extension: &str) -> StoreResult<PathBuf> {
        Ok(self.shard_dir(hash)?.join(object_file_name(hash, extension)))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// A fresh, unique staging path for an upload of `hash`.
    pub fn staging_path(&self, hash: &ContentHash) -> PathBuf {
        let nonce = uuid::Uuid::now_v7().simple();
        self.staging_dir()
            .join(format!("{hash}.{nonce}.{STAGING_SUFFIX}"))
    }
}

/// The stored file name for an object: `hash.extension`, or just `hash` when
/// the extension is empty.
pub fn object_file_name(hash: &ContentHash, extension: &str) -> String {
    if extension.is_empty() {
        hash.to_string()
    } else {
        format!("{hash}.{extension}")
    }
}

/// Derive a stored extension from a client-supplied file name.
///
/// Any directory components are dropped first, then the text after the final
/// `.` is taken verbatim. A name without a `.` has the empty extension.
/// Extensions with control characters are rejected: they could never be
/// sent back in a `Content-Disposition` header.
pub fn extension_of(original_name: &str) -> StoreResult<&str> {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let extension = base.rsplit_once('.').map_or("", |(_, ext)| ext);
    if extension.chars().any(char::is_control) {
        return Err(StoreError::InvalidName(original_name.to_string()));
    }
    Ok(extension)
}
