use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use hoard_crypto::{ContentHasher, CHUNK_SIZE};
use hoard_types::ContentHash;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::layout::{extension_of, object_file_name, Layout, STAGING_SUFFIX};
use crate::locate::locate_extension;
use crate::locks::LockTable;

/// A stored object as seen by a reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub hash: ContentHash,
    /// Extension recovered from the stored file name, possibly empty.
    pub extension: String,
    /// Full path of the stored file.
    pub path: PathBuf,
}

impl StoredFile {
    /// The suggested download name: `hash.extension`, or `hash`.
    pub fn file_name(&self) -> String {
        object_file_name(&self.hash, &self.extension)
    }
}

/// Sharded on-disk content-addressed file store.
///
/// Objects live at `<root>/<hash[0:N]>/<hash>.<extension>`. There is no
/// in-memory index; every operation re-derives state from the filesystem.
///
/// # Concurrency
///
/// Upload, download and remove of the same hash are serialized by a per-hash
/// lock held for the whole operation. Different hashes proceed in parallel.
/// Creating a shard directory and publishing an object into it, and removing
/// an emptied shard directory, additionally take a short per-shard lock so a
/// remove cannot delete a directory a sibling upload is about to rename into.
/// The hash lock is always taken before the shard lock.
///
/// Uploads are written to a staging file and renamed into place, so readers
/// never observe a partially written object.
#[derive(Debug)]
pub struct FsObjectStore {
    config: StoreConfig,
    layout: Layout,
    hasher: ContentHasher,
    hash_locks: LockTable,
    shard_locks: LockTable,
}

impl FsObjectStore {
    /// Open the store described by `config`, creating the root and staging
    /// directories if needed.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let layout = Layout::new(&config.root, config.shard_len);
        fs::create_dir_all(layout.root())?;
        fs::create_dir_all(layout.staging_dir())?;

        let store = Self {
            hasher: ContentHasher::new(config.algorithm),
            layout,
            config,
            hash_locks: LockTable::new(),
            shard_locks: LockTable::new(),
        };

        if store.config.sweep_staging_on_open {
            let swept = store.sweep_staging()?;
            if swept > 0 {
                info!(swept, "removed leftover staging files");
            }
        }

        debug!(
            root = ?store.layout.root(),
            shard_len = store.config.shard_len,
            algorithm = %store.config.algorithm,
            "object store opened"
        );
        Ok(store)
    }

    /// Open a store at `root` with default settings.
    pub fn open_at(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Store the content of `source` under its content hash.
    ///
    /// The source is read twice from its start: once to hash it, once to
    /// copy it. The extension is taken from `original_name`. Content that is
    /// already stored, under any extension, is rejected with
    /// [`StoreError::DuplicateObject`]; existing objects are never
    /// overwritten.
    #[instrument(skip(self, source), level = "debug")]
    pub fn upload<R>(&self, source: &mut R, original_name: &str) -> StoreResult<ContentHash>
    where
        R: Read + Seek + ?Sized,
    {
        let extension = extension_of(original_name)?;

        source.seek(SeekFrom::Start(0))?;
        let hash = self.hasher.hash_reader(source)?;
        let object_path = self.layout.object_path(&hash, extension)?;

        let _hash_guard = self.hash_locks.lock(hash.as_str());

        match locate_extension(&self.layout, &hash) {
            Ok(existing) => {
                debug!(hash = %hash, existing = %existing, "rejecting duplicate upload");
                return Err(StoreError::DuplicateObject(hash));
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        source.seek(SeekFrom::Start(0))?;
        let staging = self.layout.staging_path(&hash);
        let written = match self.write_staging(source, &staging) {
            Ok(written) => written,
            Err(e) => {
                discard_staging(&staging);
                return Err(e);
            }
        };

        if let Err(e) = self.publish(&hash, &staging, &object_path) {
            discard_staging(&staging);
            return Err(e);
        }

        info!(hash = %hash, name = original_name, bytes = written, path = ?object_path, "stored object");
        Ok(hash)
    }

    /// Store an in-memory buffer.
    pub fn upload_bytes(&self, data: &[u8], original_name: &str) -> StoreResult<ContentHash> {
        self.upload(&mut Cursor::new(data), original_name)
    }

    /// Store a file from the local filesystem, taking the extension from its
    /// file name.
    pub fn upload_file(&self, path: impl AsRef<Path>) -> StoreResult<ContentHash> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = File::open(path)?;
        self.upload(&mut file, &name)
    }

    /// Copy `source` into a new staging file in bounded chunks.
    fn write_staging<R>(&self, source: &mut R, staging: &Path) -> StoreResult<u64>
    where
        R: Read + ?Sized,
    {
        let create = || OpenOptions::new().write(true).create_new(true).open(staging);
        let mut file = match create() {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Staging directory removed while running.
                fs::create_dir_all(self.layout.staging_dir())?;
                info!(path = ?self.layout.staging_dir(), "recreated staging directory");
                create()?
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&buf[..n])?;
            written += n as u64;
        }

        if self.config.fsync {
            file.sync_all()?;
        }
        Ok(written)
    }

    /// Make a finished staging file visible as the object for `hash`.
    fn publish(&self, hash: &ContentHash, staging: &Path, object_path: &Path) -> StoreResult<()> {
        let shard = self.layout.shard_name(hash)?;
        let shard_dir = self.layout.shard_dir(hash)?;
        let _shard_guard = self.shard_locks.lock(shard);

        match fs::create_dir(&shard_dir) {
            Ok(()) => info!(shard = ?shard_dir, "created shard directory"),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Root removed from under us; recreate the whole chain.
                fs::create_dir_all(&shard_dir)?;
                info!(shard = ?shard_dir, "created shard directory");
            }
            Err(e) => return Err(e.into()),
        }

        fs::rename(staging, object_path)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Download
    // -----------------------------------------------------------------------

    /// Resolve the stored file for `hash`.
    ///
    /// The returned path is only guaranteed to exist at the moment of the
    /// call. Readers that must not race a concurrent remove should use
    /// [`FsObjectStore::open_object`].
    #[instrument(skip(self), level = "debug")]
    pub fn download(&self, hash: &ContentHash) -> StoreResult<StoredFile> {
        self.layout.shard_dir(hash)?;
        let _hash_guard = self.hash_locks.lock(hash.as_str());
        self.resolve(hash)
    }

    /// Resolve and open the stored file for `hash` under the hash lock.
    ///
    /// On Unix an open handle stays readable even if the object is removed
    /// afterwards.
    #[instrument(skip(self), level = "debug")]
    pub fn open_object(&self, hash: &ContentHash) -> StoreResult<(StoredFile, File)> {
        self.layout.shard_dir(hash)?;
        let _hash_guard = self.hash_locks.lock(hash.as_str());
        let stored = self.resolve(hash)?;
        let file = File::open(&stored.path).map_err(|e| not_found_or(e, hash))?;
        Ok((stored, file))
    }

    /// Read the full content of the object for `hash`.
    pub fn read(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let (_, mut file) = self.open_object(hash)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Check whether an object for `hash` is stored.
    pub fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        match self.download(hash) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Locate the extension and confirm the object is a regular file.
    /// Callers hold the hash lock.
    fn resolve(&self, hash: &ContentHash) -> StoreResult<StoredFile> {
        let extension = locate_extension(&self.layout, hash)?;
        let path = self.layout.object_path(hash, &extension)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(StoredFile {
                hash: hash.clone(),
                extension,
                path,
            }),
            Ok(_) => Err(StoreError::NotFound(hash.clone())),
            Err(e) => Err(not_found_or(e, hash)),
        }
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Delete the object for `hash`, and its shard directory if that leaves
    /// it empty.
    ///
    /// Failure to remove the emptied shard directory is logged and does not
    /// fail the operation: the object itself is already gone.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, hash: &ContentHash) -> StoreResult<()> {
        self.layout.shard_dir(hash)?;
        let _hash_guard = self.hash_locks.lock(hash.as_str());

        let stored = self.resolve(hash)?;
        fs::remove_file(&stored.path).map_err(|e| not_found_or(e, hash))?;
        info!(hash = %hash, file = %stored.file_name(), "removed object");

        self.remove_shard_if_empty(hash);
        Ok(())
    }

    fn remove_shard_if_empty(&self, hash: &ContentHash) {
        let (Ok(shard), Ok(shard_dir)) = (self.layout.shard_name(hash), self.layout.shard_dir(hash))
        else {
            return;
        };
        let _shard_guard = self.shard_locks.lock(shard);

        let empty = match fs::read_dir(&shard_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                warn!(shard = ?shard_dir, error = %e, "failed to inspect shard directory");
                return;
            }
        };
        if !empty {
            return;
        }

        match fs::remove_dir(&shard_dir) {
            Ok(()) => info!(shard = ?shard_dir, "removed empty shard directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(shard = ?shard_dir, error = %e, "failed to remove empty shard directory"),
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Delete staging files left behind by interrupted uploads.
    ///
    /// Only safe while no upload is in flight, which is why it runs from
    /// [`FsObjectStore::open`].
    pub fn sweep_staging(&self) -> StoreResult<usize> {
        let staging_dir = self.layout.staging_dir();
        let entries = match fs::read_dir(&staging_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut swept = 0;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_part = path.extension().is_some_and(|ext| ext == STAGING_SUFFIX);
            if !entry.file_type()?.is_file() || !is_part {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => swept += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(swept)
    }
}

fn not_found_or(e: io::Error, hash: &ContentHash) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound(hash.clone())
    } else {
        StoreError::Io(e)
    }
}

fn discard_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => debug!(path = ?staging, "discarded staging file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?staging, error = %e, "failed to discard staging file"),
    }
}
