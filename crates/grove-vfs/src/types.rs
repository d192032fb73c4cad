//! Public record and policy types for the VFS surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::media::MediaMeta;

/// Entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// Denormalized view of one indexed entry, as returned by directory listing
/// and mutation operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub uuid: Uuid,
    pub name: String,
    pub kind: EntryKind,
    /// Modification time in milliseconds since the epoch. Negative values
    /// mark an entry whose on-disk state has not been confirmed yet.
    pub mtime: i64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaMeta>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub archived: bool,
}

// ---------------------------------------------------------------------------
// Conflict policy
// ---------------------------------------------------------------------------

/// What to do when a create/rename/move collides with an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Pick a non-colliding name deterministically and proceed.
    Rename,
    /// Leave the existing entry alone and report it.
    Skip,
}

/// Conflict policy pair: `same` governs collisions between entries of the
/// same type, `diff` collisions across types. `None` fails with `Conflict`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub same: Option<PolicyAction>,
    pub diff: Option<PolicyAction>,
}

impl Policy {
    pub const FAIL: Policy = Policy { same: None, diff: None };

    pub fn new(same: Option<PolicyAction>, diff: Option<PolicyAction>) -> Self {
        Self { same, diff }
    }

    pub fn rename_both() -> Self {
        Self::new(Some(PolicyAction::Rename), Some(PolicyAction::Rename))
    }

    pub fn skip_both() -> Self {
        Self::new(Some(PolicyAction::Skip), Some(PolicyAction::Skip))
    }
}

/// How a colliding name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// No conflict; the requested name was used.
    AsRequested,
    /// The policy chose a disambiguated name.
    Renamed,
    /// The policy skipped the operation; the record is the pre-existing entry.
    Skipped,
}

/// Outcome of a create/rename/move: the resulting (or pre-existing) entry
/// plus how its name was resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub record: EntryRecord,
    pub kind: ResolutionKind,
}

// ---------------------------------------------------------------------------
// Roster boundary records
// ---------------------------------------------------------------------------

/// A user record as supplied by the collaborating user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uuid: Uuid,
    #[serde(default)]
    pub deleted: bool,
}

/// Drive access model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DriveKind {
    /// Owned by a single user; invisible to everyone else.
    Private { owner: Uuid },
    /// Visible to all users; writable by the writelist.
    Public { writelist: Vec<Uuid> },
    /// Backup target; owned and written by a single user.
    Backup { owner: Uuid },
}

/// A drive record as supplied by the collaborating drive store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drive {
    pub uuid: Uuid,
    #[serde(flatten)]
    pub kind: DriveKind,
    #[serde(default)]
    pub deleted: bool,
}

impl Drive {
    pub fn owner(&self) -> Option<Uuid> {
        match &self.kind {
            DriveKind::Private { owner } | DriveKind::Backup { owner } => Some(*owner),
            DriveKind::Public { .. } => None,
        }
    }

    /// Whether `user` may see this drive at all.
    pub fn can_read(&self, user: Uuid) -> bool {
        match &self.kind {
            DriveKind::Private { owner } | DriveKind::Backup { owner } => *owner == user,
            DriveKind::Public { .. } => true,
        }
    }

    /// Whether `user` may mutate this drive's contents.
    pub fn can_write(&self, user: Uuid) -> bool {
        match &self.kind {
            DriveKind::Private { owner } | DriveKind::Backup { owner } => *owner == user,
            DriveKind::Public { writelist } => writelist.contains(&user),
        }
    }
}

/// Point-in-time snapshot of the external user/drive/tag rosters.
///
/// The stores owning these records push a fresh snapshot through
/// [`Vfs::update_roster`] whenever anything changes; the facade diffs it
/// against the live root set.
///
/// [`Vfs::update_roster`]: crate::vfs::Vfs::update_roster
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub users: Vec<User>,
    pub drives: Vec<Drive>,
    /// Tag ids currently defined by the tag store.
    pub tags: std::collections::BTreeSet<u32>,
}

impl Roster {
    pub fn drive(&self, uuid: Uuid) -> Option<&Drive> {
        self.drives.iter().find(|d| d.uuid == uuid)
    }

    pub fn user_exists(&self, uuid: Uuid) -> bool {
        self.users.iter().any(|u| u.uuid == uuid && !u.deleted)
    }

    /// Drives that are currently valid: not deleted, and for owned kinds,
    /// owned by a live user.
    pub fn valid_drives(&self) -> impl Iterator<Item = &Drive> {
        self.drives.iter().filter(|d| {
            !d.deleted
                && match d.owner() {
                    Some(owner) => self.user_exists(owner),
                    None => true,
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_permissions() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let private = Drive {
            uuid: Uuid::new_v4(),
            kind: DriveKind::Private { owner },
            deleted: false,
        };
        assert!(private.can_read(owner) && private.can_write(owner));
        assert!(!private.can_read(other) && !private.can_write(other));

        let public = Drive {
            uuid: Uuid::new_v4(),
            kind: DriveKind::Public { writelist: vec![owner] },
            deleted: false,
        };
        assert!(public.can_read(other));
        assert!(!public.can_write(other));
        assert!(public.can_write(owner));
    }

    #[test]
    fn roster_validity() {
        let alive = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let roster = Roster {
            users: vec![
                User { uuid: alive, deleted: false },
                User { uuid: gone, deleted: true },
            ],
            drives: vec![
                Drive {
                    uuid: Uuid::new_v4(),
                    kind: DriveKind::Private { owner: alive },
                    deleted: false,
                },
                Drive {
                    uuid: Uuid::new_v4(),
                    kind: DriveKind::Private { owner: gone },
                    deleted: false,
                },
                Drive {
                    uuid: Uuid::new_v4(),
                    kind: DriveKind::Public { writelist: vec![] },
                    deleted: true,
                },
            ],
            tags: Default::default(),
        };
        let valid: Vec<_> = roster.valid_drives().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].owner(), Some(alive));
    }
}
