use std::fs;
use std::io::ErrorKind;

use tracing::{debug, trace};

use hoard_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::layout::Layout;

/// Recover the extension of the stored object for `hash`.
///
/// The store keeps no index, so the extension is found by listing the shard
/// directory and matching file names whose stem is exactly the hash:
/// `<hash>.<ext>` yields `ext`, a bare `<hash>` yields the empty extension.
/// Only regular files are considered.
///
/// If several files match (never produced by upload, but not structurally
/// prevented), the first one in directory-listing order wins. That order is
/// filesystem-defined.
///
/// Fails with [`StoreError::NotFound`] if the shard directory is missing or
/// holds no match.
pub fn locate_extension(layout: &Layout, hash: &ContentHash) -> StoreResult<String> {
    let shard_dir = layout.shard_dir(hash)?;
    let entries = match fs::read_dir(&shard_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!(shard = ?shard_dir, "shard directory absent");
            return Err(StoreError::NotFound(hash.clone()));
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(extension) = match_object_name(name, hash.as_str()) {
            debug!(hash = %hash, extension, "located object");
            return Ok(extension.to_string());
        }
    }

    Err(StoreError::NotFound(hash.clone()))
}

/// The extension of `name` if its stem is exactly `hash`.
fn match_object_name<'a>(name: &'a str, hash: &str) -> Option<&'a str> {
    if name == hash {
        return Some("");
    }
    let (stem, extension) = name.rsplit_once('.')?;
    (stem == hash && !extension.is_empty()).then_some(extension)
}
