use uuid::Uuid;

/// Error taxonomy for VFS operations.
///
/// `NotFound` deliberately covers both "absent" and "not visible to the
/// caller" so that responses never leak the existence of entries on drives
/// the caller has no access to.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("directory {0} is no longer under the requested drive")]
    Moved(Uuid),

    #[error("name conflict: {0}")]
    Conflict(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("size {size} is not a multiple of the append unit {unit}")]
    Misaligned { size: u64, unit: u64 },

    #[error("hash mismatch: expected {expected}, found {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("append target changed underneath us: {0}")]
    Race(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl VfsError {
    /// Short status keyword used when reporting per-name outcomes of batch
    /// operations.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Moved(_) => "moved",
            Self::Conflict(_) => "conflict",
            Self::NotAFile(_) => "not_a_file",
            Self::IsADirectory(_) => "is_a_directory",
            Self::Misaligned { .. } => "misaligned",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Race(_) => "race",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
