//! Index node types.

use uuid::Uuid;

use super::arena::OptionNodeId;
use crate::fingerprint::Fingerprint;
use crate::media::MediaMeta;
use crate::types::{EntryKind, EntryRecord};
use crate::xstat::XStat;

/// Directory mtime marking "attached but children not yet confirmed by an
/// on-disk read". Any real timestamp is non-negative.
pub const PROVISIONAL_MTIME: i64 = -1;

#[derive(Debug)]
pub struct DirNode {
    /// On-disk mtime at which `children` was last reconciled, or
    /// [`PROVISIONAL_MTIME`].
    pub mtime: i64,
    /// Child ids, kept sorted by child name, unique by name.
    pub children: Vec<super::arena::NodeId>,
    pub archived: bool,
    pub bctime: Option<i64>,
    pub bmtime: Option<i64>,
}

#[derive(Debug)]
pub struct FileNode {
    pub mtime: i64,
    pub size: u64,
    pub hash: Option<Fingerprint>,
    pub tags: Vec<u32>,
    pub media: Option<MediaMeta>,
}

#[derive(Debug)]
pub enum NodeKind {
    Directory(DirNode),
    File(FileNode),
}

#[derive(Debug)]
pub struct Node {
    pub uuid: Uuid,
    pub name: String,
    pub parent: OptionNodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn new_dir(uuid: Uuid, name: String, parent: OptionNodeId) -> Self {
        Self {
            uuid,
            name,
            parent,
            kind: NodeKind::Directory(DirNode {
                mtime: PROVISIONAL_MTIME,
                children: Vec::new(),
                archived: false,
                bctime: None,
                bmtime: None,
            }),
        }
    }

    pub fn new_file(uuid: Uuid, name: String, parent: OptionNodeId, stat: &XStat) -> Self {
        let media = crate::media::media_kind_of(&name).map(|kind| MediaMeta {
            kind,
            width: None,
            height: None,
            duration_ms: None,
        });
        Self {
            uuid,
            name,
            parent,
            kind: NodeKind::File(FileNode {
                mtime: stat.mtime,
                size: stat.size,
                hash: stat.hash.clone(),
                tags: stat.tags.clone(),
                media,
            }),
        }
    }

    #[inline]
    pub fn entry_kind(&self) -> EntryKind {
        match self.kind {
            NodeKind::Directory(_) => EntryKind::Directory,
            NodeKind::File(_) => EntryKind::File,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn as_dir(&self) -> Option<&DirNode> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut DirNode> {
        match &mut self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match &mut self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn mtime(&self) -> i64 {
        match &self.kind {
            NodeKind::Directory(dir) => dir.mtime,
            NodeKind::File(file) => file.mtime,
        }
    }

    /// Denormalized record for API responses.
    pub fn record(&self) -> EntryRecord {
        match &self.kind {
            NodeKind::Directory(dir) => EntryRecord {
                uuid: self.uuid,
                name: self.name.clone(),
                kind: EntryKind::Directory,
                mtime: dir.mtime,
                size: 0,
                hash: None,
                tags: Vec::new(),
                media: None,
                archived: dir.archived,
            },
            NodeKind::File(file) => EntryRecord {
                uuid: self.uuid,
                name: self.name.clone(),
                kind: EntryKind::File,
                mtime: file.mtime,
                size: file.size,
                hash: file.hash.clone(),
                tags: file.tags.clone(),
                media: file.media.clone(),
                archived: false,
            },
        }
    }
}
