//! Content-addressed entry names
//!
//! An entry is named `{digest}-{path}` where `digest` is the URL-safe,
//! unpadded base64 form of the SHA-256 of the original file contents and
//! `path` is the same encoding of the archive path. The path component keeps
//! identical contents stored under different names apart.

use crate::error::{CacheError, CacheResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::fmt;

/// File name of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file_name: String,
}

impl CacheKey {
    /// Key for `content` stored under archive `path`
    ///
    /// Fails when the encoded name is longer than `max_len` bytes.
    pub fn new(path: &str, content: &[u8], max_len: usize) -> CacheResult<Self> {
        let digest = Sha256::digest(content);
        let mut file_name = URL_SAFE_NO_PAD.encode(digest);
        file_name.push('-');
        URL_SAFE_NO_PAD.encode_string(path.as_bytes(), &mut file_name);

        if file_name.len() > max_len {
            return Err(CacheError::KeyTooLong {
                len: file_name.len(),
                max: max_len,
            });
        }
        Ok(Self { file_name })
    }

    /// Entry file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}
