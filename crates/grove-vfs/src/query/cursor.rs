//! Resumption cursors.
//!
//! Cursors travel to clients as opaque strings and come back on the next
//! page; both forms here parse strictly and reject anything malformed with
//! `InvalidArgument`.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::VfsError;
use crate::types::EntryKind;

/// Chronological cursor: `"<mtime>.<uuid>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeCursor {
    pub mtime: i64,
    pub uuid: Uuid,
}

impl FromStr for TimeCursor {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VfsError::InvalidArgument(format!("bad time cursor: {s:?}"));
        let (mtime, uuid) = s.split_once('.').ok_or_else(bad)?;
        Ok(Self {
            mtime: mtime.parse().map_err(|_| bad())?,
            uuid: uuid.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for TimeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.mtime, self.uuid)
    }
}

/// Hierarchical cursor: `"<place index>:<d|f>:<name path>"` with the name
/// path joined by `/` (which cannot occur inside a path segment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeCursor {
    pub place: usize,
    pub kind: EntryKind,
    pub path: Vec<String>,
}

impl FromStr for TreeCursor {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VfsError::InvalidArgument(format!("bad tree cursor: {s:?}"));
        let (place, rest) = s.split_once(':').ok_or_else(bad)?;
        let (kind, path) = rest.split_once(':').ok_or_else(bad)?;
        let kind = match kind {
            "d" => EntryKind::Directory,
            "f" => EntryKind::File,
            _ => return Err(bad()),
        };
        let path: Vec<String> = path.split('/').map(str::to_owned).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(bad());
        }
        Ok(Self {
            place: place.parse().map_err(|_| bad())?,
            kind,
            path,
        })
    }
}

impl fmt::Display for TreeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EntryKind::Directory => 'd',
            EntryKind::File => 'f',
        };
        write!(f, "{}:{}:{}", self.place, kind, self.path.join("/"))
    }
}
