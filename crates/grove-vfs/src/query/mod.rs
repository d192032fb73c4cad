//! Query engine: two orthogonal orderings over the Forest.
//!
//! Chronological mode scans the time-sorted file sequence from a
//! `(time, uuid)` cursor; hierarchical mode walks each permitted place
//! depth-first with a `(place, type, name path)` cursor. Both share the
//! same name/type/tag filters. Permission filtering happens before the
//! engine ever runs: the place list passed in here has already been
//! resolved and authorized by the facade.

mod cursor;
mod filter;
mod scan;
mod spill;
mod walk;

pub(crate) use cursor::{TimeCursor, TreeCursor};
pub(crate) use filter::CompiledFilter;
pub(crate) use scan::scan_timeline;
pub(crate) use spill::spill_records;
pub(crate) use walk::walk_places;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::media::MediaMeta;
use crate::types::EntryKind;

/// Scan direction for chronological queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOrder {
    Newest,
    Oldest,
}

/// Query parameters. `order` selects the mode: chronological when present,
/// hierarchical otherwise.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Roots or directories scoping the query. Order matters: records
    /// report the index of the first matching place.
    pub places: Vec<Uuid>,
    pub order: Option<TimeOrder>,
    /// Stop after this many matches (record mode only).
    pub count: Option<usize>,
    /// Case-insensitive substring match on the entry name.
    pub name: Option<String>,
    /// Explicit extension list. Mutually exclusive with `class`.
    pub types: Vec<String>,
    /// Media class shortcut (`image`, `video`, `audio`, `docs`).
    pub class: Option<String>,
    /// Required tags; matching files carry a superset.
    pub tags: Vec<u32>,
    /// Chronological resumption cursor, `"<mtime>.<uuid>"`.
    pub start: Option<String>,
    /// Whether `start` itself was already delivered.
    pub start_exclusive: bool,
    /// Hierarchical resumption cursor, `"<place>:<d|f>:<name path>"`.
    pub last: Option<String>,
    /// Hierarchical mode: emit files only.
    pub files_only: bool,
    /// Return a match count instead of records.
    pub count_only: bool,
    /// With `count_only`: group the count per place.
    pub group_by_place: bool,
}

/// One denormalized query match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Index into the request's place list.
    pub place: usize,
    pub uuid: Uuid,
    pub kind: EntryKind,
    /// Name path relative to the matched place.
    pub namepath: Vec<String>,
    pub size: u64,
    pub mtime: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaMeta>,
}

/// Per-place match count for grouped count queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceCount {
    pub place: usize,
    pub count: usize,
}

/// Query outcome. Large record sets are spilled to a JSON temp file owned
/// by the caller.
#[derive(Debug)]
pub enum QueryResult {
    Records(Vec<QueryRecord>),
    Count(usize),
    PlaceCounts(Vec<PlaceCount>),
    Spilled(PathBuf),
}
