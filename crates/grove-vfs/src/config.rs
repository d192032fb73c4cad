//! VFS configuration.
//!
//! Everything that used to be ambient process state (temp directory, append
//! alignment) is an explicit value threaded through [`Vfs::new`].
//!
//! [`Vfs::new`]: crate::vfs::Vfs::new

use std::path::{Path, PathBuf};

/// Default append alignment unit: 1 GiB.
pub const DEFAULT_APPEND_UNIT: u64 = 1024 * 1024 * 1024;

/// Default record count above which query results are spilled to a temp file.
pub const DEFAULT_SPILL_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
pub struct VfsConfig {
    /// Directory holding one subdirectory per drive, named by drive uuid.
    pub drives_dir: PathBuf,

    /// Staging area for uploads, append scratch and query spill files.
    ///
    /// Must live on the same filesystem as `drives_dir` so staged files can
    /// be renamed into place atomically.
    pub temp_dir: PathBuf,

    /// A file may only be appended to while its size is an exact multiple
    /// of this unit. Fixed at the storage layer, never per call.
    pub append_unit: u64,

    /// Query results with more records than this are written to a JSON
    /// temp file and returned by path. The caller owns deleting that file.
    pub spill_threshold: usize,
}

impl VfsConfig {
    pub fn new(drives_dir: impl AsRef<Path>, temp_dir: impl AsRef<Path>) -> Self {
        Self {
            drives_dir: drives_dir.as_ref().to_path_buf(),
            temp_dir: temp_dir.as_ref().to_path_buf(),
            append_unit: DEFAULT_APPEND_UNIT,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
        }
    }

    /// Overrides the append alignment unit (used by tests with small files).
    pub fn with_append_unit(mut self, unit: u64) -> Self {
        self.append_unit = unit;
        self
    }

    /// Overrides the spill threshold.
    pub fn with_spill_threshold(mut self, threshold: usize) -> Self {
        self.spill_threshold = threshold;
        self
    }
}
