//! Foundation types for the Hoard content-addressed file store.
//!
//! Every stored file is identified solely by the hex digest of its content.
//! This crate defines that identifier and the digest algorithms that can
//! produce it. Every other Hoard crate depends on `hoard-types`.
//!
//! # Key Types
//!
//! - [`ContentHash`]: lowercase hex digest identifying stored content
//! - [`HashAlgorithm`]: digest function used to compute a [`ContentHash`]

pub mod algorithm;
pub mod error;
pub mod hash;

pub use algorithm::HashAlgorithm;
pub use error::TypeError;
pub use hash::ContentHash;
