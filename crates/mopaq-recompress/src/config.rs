//! Configuration for recompression runs

use crate::error::{RecompressError, RecompressResult};
use mopaq_cache::CacheConfig;
use mopaq_formats::archive::MAX_SECTOR_SHIFT;
use mopaq_formats::codec::{DEFAULT_BLOCK_SPLITTING_MAX, DEFAULT_ITERATIONS, SectorEncoder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recompression run configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```
/// use mopaq_recompress::RecompressConfig;
///
/// let config = RecompressConfig::from_toml_str("threads = 8\nuse_cache = true\n")
///     .expect("valid configuration");
/// assert_eq!(config.threads, 8);
/// assert_eq!(config.iterations, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecompressConfig {
    /// Worker count, the launching thread included
    pub threads: usize,
    /// zopfli iterations spent on every sector
    pub iterations: u64,
    /// Most block splits zopfli may try per sector
    pub block_splitting_max: u16,
    /// Sector size exponent of the output archive
    pub shift: u16,
    /// Reuse and populate the result cache
    pub use_cache: bool,
    /// Result cache directory
    pub cache_dir: PathBuf,
    /// Extra listfile consulted before the archive's own
    pub listfile: Option<PathBuf>,
}

impl Default for RecompressConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            iterations: DEFAULT_ITERATIONS,
            block_splitting_max: DEFAULT_BLOCK_SPLITTING_MAX,
            shift: 15,
            use_cache: false,
            cache_dir: PathBuf::from("./cache"),
            listfile: None,
        }
    }
}

impl RecompressConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> RecompressResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML configuration file
    pub fn load(path: &Path) -> RecompressResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the worker count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the zopfli iteration count
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the zopfli block split cap
    pub fn with_block_splitting_max(mut self, block_splitting_max: u16) -> Self {
        self.block_splitting_max = block_splitting_max;
        self
    }

    /// Set the output sector size exponent
    pub fn with_shift(mut self, shift: u16) -> Self {
        self.shift = shift;
        self
    }

    /// Enable the result cache in `cache_dir`
    pub fn with_cache(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.use_cache = true;
        self.cache_dir = cache_dir.into();
        self
    }

    /// Set an external listfile
    pub fn with_listfile(mut self, listfile: impl Into<PathBuf>) -> Self {
        self.listfile = Some(listfile.into());
        self
    }

    /// Check ranges
    pub fn validate(&self) -> RecompressResult<()> {
        if self.threads == 0 {
            return Err(RecompressError::InvalidConfiguration(
                "threads must be at least 1".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(RecompressError::InvalidConfiguration(
                "iterations must be greater than 0".to_string(),
            ));
        }
        if self.block_splitting_max == 0 {
            return Err(RecompressError::InvalidConfiguration(
                "block splitting max must be greater than 0".to_string(),
            ));
        }
        if self.shift > MAX_SECTOR_SHIFT {
            return Err(RecompressError::InvalidConfiguration(format!(
                "sector shift {} is outside 0..={MAX_SECTOR_SHIFT}",
                self.shift
            )));
        }
        Ok(())
    }

    /// Sector encoder for these settings
    pub fn encoder(&self) -> SectorEncoder {
        SectorEncoder::new(self.iterations, self.block_splitting_max)
    }

    /// Result cache settings derived from this configuration
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().with_cache_dir(&self.cache_dir)
    }
}
