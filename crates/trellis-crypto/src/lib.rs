//! Content hashing for Trellis.
//!
//! Provides the domain-separated BLAKE3 [`ContentHasher`] and the canonical
//! JSON encoding it hashes over. Two nodes whose canonical encodings are
//! byte-identical always receive the same [`ObjectId`](trellis_types::ObjectId);
//! this is the whole deduplication mechanism.
//!
//! Hashing delegates to `blake3`; nothing here implements its own primitives.

pub mod canonical;
pub mod hasher;

pub use canonical::{embed_id, to_canonical_vec};
pub use hasher::{ContentHasher, HasherError};
