use std::path::{Path, PathBuf};

/// Bytes read from the compressed source per decompression step
pub const CHUNK_SIZE: usize = 2048;

/// Length of the `etext` prefix on a record's `rdf:ID`
pub const BOOK_ID_PREFIX_LEN: usize = 5;

/// Length of `http://www.gutenberg.org/dirs/` on a file's `rdf:about`
pub const FILE_URL_PREFIX_LEN: usize = 30;

/// Length of the `#etext` prefix on an `rdf:resource` reference
pub const FORMAT_OF_PREFIX_LEN: usize = 6;

/// Bumped whenever the persisted catalog layout changes
pub const CATALOG_VERSION: u32 = 1;

/// Progress update interval (tick every N committed records)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Spare output capacity reserved before each bzip2 call
pub const DECOMPRESS_RESERVE: usize = 16 * 1024;

/// Source used by `CatalogOptions::default()`
pub const DEFAULT_CATALOG_FILE: &str = "catalog.rdf.bz2";

/// Destination used by `CatalogOptions::default()`
pub const DEFAULT_OUTPUT_FILE: &str = "catalog.bin";

/// What to do with a file descriptor whose book has no committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Log it, count it, keep parsing
    #[default]
    Skip,
    /// Abort the run with `CatalogError::OrphanFileDescriptor`
    Fail,
}

/// Caller-owned settings for one catalog run.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub chunk_size: usize,
    pub orphan_policy: OrphanPolicy,
    /// Return a persisted catalog built from an unchanged source instead of
    /// parsing again. Freshness is judged by source path, mtime and size.
    pub reuse: bool,
    pub show_progress: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_FILE, DEFAULT_OUTPUT_FILE)
    }
}

impl CatalogOptions {
    pub fn new(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
            chunk_size: CHUNK_SIZE,
            orphan_policy: OrphanPolicy::default(),
            reuse: false,
            show_progress: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}
