//! Virtual-filesystem and indexing core of the grove storage appliance.
//!
//! Overlays a queryable, tag- and time-aware index on top of real on-disk
//! directory trees ("drives"). Every mutating operation is crash-consistent
//! (staged + atomically renamed, identity attributes set before
//! publication) and race-detected; the in-memory index is reconciled with
//! disk at a single point, the directory read, which every mutation routes
//! through before reporting success.
//!
//! Entry identity and content fingerprints live in filesystem extended
//! attributes; there is no database to keep in sync, the index is rebuilt
//! from directory reads.

mod append;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod media;
pub mod query;
mod storage;
mod tree;
pub mod types;
pub mod vfs;
mod xstat;

pub use config::VfsConfig;
pub use error::{Result, VfsError};
pub use fingerprint::Fingerprint;
pub use media::{MediaKind, MediaMeta};
pub use query::{PlaceCount, QueryRecord, QueryRequest, QueryResult, TimeOrder};
pub use types::{
    Drive, DriveKind, EntryKind, EntryRecord, Policy, PolicyAction, Resolution, ResolutionKind,
    Roster, User,
};
pub use vfs::{DstSpec, NameResults, SrcSpec, Vfs};
