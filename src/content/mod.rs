//! Content analysis for evidence files
//!
//! This module provides:
//! - Streaming MD5/SHA-1/SHA-256 identity digests

pub mod checksum;

pub use checksum::{compute_digests, Digests, FileHasher, StreamingHasher, HASH_BUFFER_SIZE};
