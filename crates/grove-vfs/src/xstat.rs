//! Extended-attribute stat records.
//!
//! Every indexed entry carries a persistent record in a filesystem extended
//! attribute: its uuid, and for files the content fingerprint, the mtime at
//! which that fingerprint was captured, and the tag set. No database backs
//! the index; it is rebuilt entirely from directory reads plus these
//! records. Reads and writes of the attribute are whole-record and treated
//! as atomic by the rest of the core.

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::types::EntryKind;

/// Attribute name holding the serialized record.
pub const XATTR_NAME: &str = "user.grove";

/// On-disk shape of the record. Unknown fields are preserved-by-ignoring:
/// the whole record is rewritten on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStat {
    uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    hash: Option<Fingerprint>,
    /// Modification time (ms) at which `hash` was captured. A hash whose
    /// htime no longer matches the file's mtime is stale and dropped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    htime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tags: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    bctime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    bmtime: Option<i64>,
}

impl RawStat {
    fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            hash: None,
            htime: None,
            tags: None,
            archived: None,
            bctime: None,
            bmtime: None,
        }
    }
}

/// Reconciled view of one on-disk entry: filesystem metadata plus the
/// persistent record.
#[derive(Debug, Clone)]
pub struct XStat {
    pub uuid: Uuid,
    pub kind: EntryKind,
    pub mtime: i64,
    pub size: u64,
    pub hash: Option<Fingerprint>,
    pub tags: Vec<u32>,
    pub archived: bool,
    pub bctime: Option<i64>,
    pub bmtime: Option<i64>,
}

/// Millisecond timestamp of a metadata's modification time.
pub fn mtime_ms(meta: &Metadata) -> i64 {
    meta.modified()
        .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
        .unwrap_or(0)
}

/// Raw modification time used for the append race guard, where full
/// `SystemTime` resolution matters.
pub fn mtime_raw(meta: &Metadata) -> SystemTime {
    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}

fn read_raw(path: &Path) -> std::io::Result<Option<RawStat>> {
    let Some(bytes) = xattr::get(path, XATTR_NAME)? else {
        return Ok(None);
    };
    match serde_json::from_slice::<RawStat>(&bytes) {
        Ok(raw) => Ok(Some(raw)),
        Err(error) => {
            warn!(path = %path.display(), %error, "discarding unreadable stat record");
            Ok(None)
        }
    }
}

fn write_raw(path: &Path, raw: &RawStat) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(raw).expect("stat record serializes");
    xattr::set(path, XATTR_NAME, &bytes)
}

/// Reads the persistent record for `path`, creating one with a fresh uuid
/// when absent. The single read oracle for directory reconciliation.
pub fn read(path: &Path) -> Result<XStat> {
    let meta = std::fs::symlink_metadata(path)?;
    let kind = if meta.is_dir() {
        EntryKind::Directory
    } else if meta.is_file() {
        EntryKind::File
    } else {
        // Symlinks and special files are not indexed.
        return Err(crate::error::VfsError::NotFound(
            path.display().to_string(),
        ));
    };
    let raw = match read_raw(path)? {
        Some(raw) => raw,
        None => {
            let raw = RawStat::new(Uuid::new_v4());
            write_raw(path, &raw)?;
            raw
        }
    };
    let mtime = mtime_ms(&meta);
    // A fingerprint only survives while the file is unchanged since capture.
    let hash = match kind {
        EntryKind::File if raw.htime == Some(mtime) => raw.hash,
        _ => None,
    };
    Ok(XStat {
        uuid: raw.uuid,
        kind,
        mtime,
        size: if meta.is_dir() { 0 } else { meta.len() },
        hash,
        tags: raw.tags.unwrap_or_default(),
        archived: raw.archived.unwrap_or(false),
        bctime: raw.bctime,
        bmtime: raw.bmtime,
    })
}

/// Forces `path` to carry the given identity, keeping nothing else.
///
/// Used for drive roots, whose uuid must equal the owning drive's uuid.
pub fn force_uuid(path: &Path, uuid: Uuid) -> Result<()> {
    match read_raw(path)? {
        Some(raw) if raw.uuid == uuid => Ok(()),
        _ => Ok(write_raw(path, &RawStat::new(uuid))?),
    }
}

/// Stamps a staged file with its identity and fingerprint before it is
/// renamed into place. `htime` must be the staged file's current mtime so
/// the fingerprint is considered fresh after publication (rename preserves
/// mtime).
pub fn stamp_file(path: &Path, uuid: Uuid, hash: &Fingerprint, htime: i64) -> Result<()> {
    let mut raw = RawStat::new(uuid);
    raw.hash = Some(hash.clone());
    raw.htime = Some(htime);
    Ok(write_raw(path, &raw)?)
}

/// Stamps the staged replacement produced by an append: same identity and
/// tag set as the original, new fingerprint.
pub fn stamp_replacement(
    path: &Path,
    uuid: Uuid,
    hash: &Fingerprint,
    htime: i64,
    tags: &[u32],
) -> Result<()> {
    let mut raw = RawStat::new(uuid);
    raw.hash = Some(hash.clone());
    raw.htime = Some(htime);
    raw.tags = (!tags.is_empty()).then(|| tags.to_vec());
    Ok(write_raw(path, &raw)?)
}

/// Stamps a staged directory with its identity.
pub fn stamp_dir(path: &Path, uuid: Uuid) -> Result<()> {
    Ok(write_raw(path, &RawStat::new(uuid))?)
}

/// Replaces the tag set, preserving the rest of the record. Writes only
/// when the stored set differs, so repeated SETTAGS with the same set is a
/// storage-layer no-op.
///
/// Returns true when the record was rewritten.
pub fn set_tags(path: &Path, tags: &[u32]) -> Result<bool> {
    let mut raw = match read_raw(path)? {
        Some(raw) => raw,
        None => RawStat::new(Uuid::new_v4()),
    };
    let new = if tags.is_empty() { None } else { Some(tags.to_vec()) };
    if raw.tags == new {
        return Ok(false);
    }
    raw.tags = new;
    write_raw(path, &raw)?;
    Ok(true)
}
