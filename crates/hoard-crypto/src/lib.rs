//! Content hashing for the Hoard file store.
//!
//! Files are hashed by streaming them through a digest in fixed-size chunks,
//! so peak memory stays bounded regardless of file size. Every call builds
//! its own digest state; a [`ContentHasher`] holds only the algorithm choice
//! and is freely shareable across threads.
//!
//! All digests wrap established libraries.

pub mod hasher;

pub use hasher::{ContentHasher, CHUNK_SIZE};
