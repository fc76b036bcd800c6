//! Listfiles: the archive paths a table does not store by name
//!
//! A listfile is plain text with one path per entry, separated by CR, LF
//! or `;`. [`Listfile`] keeps the names whose digests match a table, in the
//! order they were first seen, and can report hash slots no name accounts
//! for.

use crate::archive::ArchiveTable;
use mopaq_crypto::PathHash;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Name of the listfile stored inside archives
pub const LISTFILE_NAME: &str = "(listfile)";

/// Name of the attributes file stored inside archives
pub const ATTRIBUTES_NAME: &str = "(attributes)";

/// Listfile errors
#[derive(Debug, Error)]
pub enum ListfileError {
    /// Listfile could not be read
    #[error("failed to read listfile {path}: {source}")]
    Io {
        /// Listfile location
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for listfile operations
pub type ListfileResult<T> = Result<T, ListfileError>;

/// Path tokens of a listfile buffer
///
/// Splits on CR, LF and `;`, skipping empty tokens. The cursor is explicit,
/// so independent tokenizers can run over different buffers at once.
#[derive(Debug, Clone)]
pub struct PathTokens<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> PathTokens<'a> {
    /// Tokenizer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    /// Byte offset of the next unread byte
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[inline]
    fn is_separator(byte: u8) -> bool {
        matches!(byte, b'\r' | b'\n' | b';')
    }
}

impl<'a> Iterator for PathTokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.data.len() && Self::is_separator(self.data[self.cursor]) {
            self.cursor += 1;
        }
        if self.cursor >= self.data.len() {
            return None;
        }

        let start = self.cursor;
        while self.cursor < self.data.len() && !Self::is_separator(self.data[self.cursor]) {
            self.cursor += 1;
        }
        Some(&self.data[start..self.cursor])
    }
}

/// Set of archive paths keyed by their two stored digests
#[derive(Debug, Default, Clone)]
pub struct Listfile {
    paths: Vec<String>,
    by_digest: HashMap<(u32, u32), usize>,
}

impl Listfile {
    /// Empty listfile
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path`; `false` if a path with the same digests is already present
    pub fn add(&mut self, path: &str) -> bool {
        let hash = PathHash::of(path);
        let key = (hash.name_a, hash.name_b);
        if self.by_digest.contains_key(&key) {
            return false;
        }
        self.by_digest.insert(key, self.paths.len());
        self.paths.push(path.to_string());
        true
    }

    /// Add every token of `data` accepted by `keep`, returning how many were new
    ///
    /// Tokens that are not valid UTF-8 are converted lossily; their digests
    /// then no longer match the archive and `keep` normally rejects them.
    pub fn add_tokens(&mut self, data: &[u8], mut keep: impl FnMut(&str) -> bool) -> usize {
        let mut added = 0;
        for token in PathTokens::new(data) {
            let path = String::from_utf8_lossy(token);
            if keep(&path) && self.add(&path) {
                added += 1;
            }
        }
        added
    }

    /// Add every name in `table` from the listfile at `path`
    pub fn add_from_file(&mut self, path: &Path, table: &ArchiveTable) -> ListfileResult<usize> {
        let data = std::fs::read(path).map_err(|source| ListfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(self.add_tokens(&data, |name| table.lookup(name).is_some()))
    }

    /// Path with the given stored digests
    pub fn find(&self, name_a: u32, name_b: u32) -> Option<&str> {
        self.by_digest
            .get(&(name_a, name_b))
            .map(|&index| self.paths[index].as_str())
    }

    /// Whether `path` (compared case-insensitively by digest) is present
    pub fn contains(&self, path: &str) -> bool {
        let hash = PathHash::of(path);
        self.by_digest.contains_key(&(hash.name_a, hash.name_b))
    }

    /// Paths in first-seen order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// No paths at all
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Occupied slots of `table` whose digests no listed path produces
    pub fn unnamed_slots(&self, table: &ArchiveTable) -> usize {
        table
            .occupied()
            .filter(|slot| self.find(slot.name_a, slot.name_b).is_none())
            .count()
    }
}
