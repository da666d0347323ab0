//! Identity digests for evidence files
//!
//! Every file is streamed once through MD5, SHA-1 and SHA-256 at the same
//! time using a fixed-size buffer, so memory use does not depend on file
//! size. The three digests are produced together or not at all.

use crate::error::{HashError, HashResult};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read buffer size for streaming hashes
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex digests of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digests {
    #[serde(rename = "MD5")]
    pub md5: String,
    #[serde(rename = "SHA1")]
    pub sha1: String,
    #[serde(rename = "SHA256")]
    pub sha256: String,
}

/// Source of file digests
///
/// The batch runner only depends on this trait, which lets tests inject
/// unreadable files without touching file permissions.
pub trait FileHasher {
    fn hash_file(&self, path: &Path) -> HashResult<Digests>;
}

/// Hashes files from disk with a bounded read buffer
#[derive(Debug, Clone)]
pub struct StreamingHasher {
    buffer_size: usize,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self {
            buffer_size: HASH_BUFFER_SIZE,
        }
    }
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHasher for StreamingHasher {
    fn hash_file(&self, path: &Path) -> HashResult<Digests> {
        let to_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(to_err)?;
        compute_digests(file, self.buffer_size).map_err(to_err)
    }
}

/// Stream a reader through all three digests in one pass
pub fn compute_digests<R: Read>(mut reader: R, buffer_size: usize) -> std::io::Result<Digests> {
    let mut md5_ctx = md5::Context::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[..n];
        md5_ctx.consume(chunk);
        sha1.update(chunk);
        sha256.update(chunk);
    }

    Ok(Digests {
        md5: format!("{:x}", md5_ctx.compute()),
        sha1: hex::encode(sha1.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}
