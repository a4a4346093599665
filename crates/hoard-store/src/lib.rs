//! Sharded on-disk storage engine for the Hoard file store.
//!
//! Clients hand the engine a file and get its content hash back; retrieval
//! and deletion are keyed by that hash alone. Objects are laid out as
//!
//! ```text
//! <root>/<hash[0:N]>/<hash>.<extension>
//! ```
//!
//! with no other metadata on disk. The extension is the only thing the store
//! remembers about the original file name, and it is recovered by scanning
//! the shard directory.
//!
//! # Components
//!
//! - [`Layout`]: path arithmetic from hash to shard directory and object path
//! - [`locate_extension`]: recovers a stored object's extension
//! - [`LockTable`]: per-key mutual exclusion
//! - [`FsObjectStore`]: upload, download and remove
//!
//! # Design Rules
//!
//! 1. One object per hash. An upload of already-stored content is rejected,
//!    never merged or overwritten.
//! 2. A shard directory exists only while it holds an object.
//! 3. The filesystem is the source of truth; nothing is cached.
//! 4. Operations on the same hash are serialized; different hashes are not.
//! 5. Partially written uploads are never visible as objects.
//! 6. All I/O errors are propagated, except failure to remove an emptied
//!    shard directory, which is logged.

pub mod config;
pub mod disk;
pub mod error;
pub mod layout;
pub mod locate;
pub mod locks;

pub use config::StoreConfig;
pub use disk::{FsObjectStore, StoredFile};
pub use error::{StoreError, StoreResult};
pub use layout::{extension_of, object_file_name, Layout, STAGING_DIR};
pub use locate::locate_extension;
pub use locks::{KeyGuard, LockTable};
