//! Read side of a recompression run: the source archive and its file names

use crate::error::{RecompressError, RecompressResult};
use memmap2::{Mmap, MmapOptions};
use mopaq_formats::archive::{ArchiveTable, BlockTableEntry, LocatedHeader, find_header};
use mopaq_formats::listfile::{ATTRIBUTES_NAME, LISTFILE_NAME, Listfile};
use mopaq_formats::sector::{extract_file, stored_range};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, info};

enum Image {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Image {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => &map[..],
            Self::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// A parsed archive whose files can be extracted
pub struct SourceArchive {
    image: Image,
    located: LocatedHeader,
    table: ArchiveTable,
    sector_size: usize,
}

impl SourceArchive {
    /// Memory-map and parse the archive at `path`
    pub fn open(path: &Path) -> RecompressResult<Self> {
        let file = File::open(path)?;

        #[allow(unsafe_code)]
        let map = unsafe { MmapOptions::new().map(&file)? };

        Self::parse(Image::Mapped(map))
    }

    /// Parse an archive image already in memory
    pub fn from_bytes(image: Vec<u8>) -> RecompressResult<Self> {
        Self::parse(Image::Owned(image))
    }

    fn parse(image: Image) -> RecompressResult<Self> {
        let located = find_header(&image)?;
        let table = ArchiveTable::parse(&image, &located)?;
        let sector_size = located.header.sector_size()?;

        info!(
            "Source archive: header at 0x{:x}, {} hash slots, {} blocks, {} byte sectors",
            located.offset,
            table.hash_table_size(),
            table.block_count(),
            sector_size
        );

        Ok(Self {
            image,
            located,
            table,
            sector_size,
        })
    }

    /// Bytes preceding the archive header
    pub fn prefix(&self) -> &[u8] {
        &self.image[..self.located.offset]
    }

    /// Header and its offset in the image
    pub fn located(&self) -> &LocatedHeader {
        &self.located
    }

    /// Parsed hash and block tables
    pub fn table(&self) -> &ArchiveTable {
        &self.table
    }

    /// Sector size of the source archive
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Block-table entry of `path`
    pub fn entry(&self, path: &str) -> RecompressResult<&BlockTableEntry> {
        self.table
            .lookup(path)
            .ok_or_else(|| RecompressError::MissingEntry {
                path: path.to_string(),
            })
    }

    /// Original contents of `path`
    pub fn extract(&self, path: &str) -> RecompressResult<Vec<u8>> {
        let entry = self.entry(path)?;
        let extracted = stored_range(&self.image, self.located.offset, entry)
            .and_then(|stored| extract_file(path, stored, entry, self.sector_size));
        extracted.map_err(|source| RecompressError::Extract {
            path: path.to_string(),
            source,
        })
    }

    /// Names of every file this run can find
    ///
    /// Sources in order: the external listfile, the archive's own
    /// `(listfile)`, then the internal `(listfile)` and `(attributes)` names.
    /// Only names present in the source table are kept.
    pub fn listfile(&self, external: Option<&Path>) -> RecompressResult<Listfile> {
        let mut listfile = Listfile::new();

        if let Some(path) = external {
            let added = listfile.add_from_file(path, &self.table)?;
            debug!("External listfile {} named {added} files", path.display());
        }

        if self.table.lookup(LISTFILE_NAME).is_some() {
            let data = self.extract(LISTFILE_NAME)?;
            let added = listfile.add_tokens(&data, |name| self.table.lookup(name).is_some());
            debug!("Internal listfile named {added} files");
        }

        for name in [LISTFILE_NAME, ATTRIBUTES_NAME] {
            if self.table.lookup(name).is_some() {
                listfile.add(name);
            }
        }

        Ok(listfile)
    }

    /// Fail unless every occupied hash slot has a name in `listfile`
    pub fn check_listfile(&self, listfile: &Listfile) -> RecompressResult<()> {
        match listfile.unnamed_slots(&self.table) {
            0 => Ok(()),
            missing => Err(RecompressError::InsufficientListfile { missing }),
        }
    }
}

impl std::fmt::Debug for SourceArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceArchive")
            .field("len", &self.image.len())
            .field("located", &self.located)
            .field("sector_size", &self.sector_size)
            .finish_non_exhaustive()
    }
}
