//! Shared fixture: a Vfs over a scratch drives directory with one user and
//! one private drive.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::path::PathBuf;

use tempfile::TempDir;
use uuid::Uuid;

use grove_vfs::{Drive, DriveKind, Fingerprint, Roster, User, Vfs, VfsConfig};

pub struct Fixture {
    pub vfs: Vfs,
    pub user: Uuid,
    pub drive: Uuid,
    // Keeps the scratch tree alive for the test's duration.
    _scratch: TempDir,
}

impl Fixture {
    pub fn roster(&self) -> Roster {
        base_roster(self.user, self.drive)
    }
}

pub fn base_roster(user: Uuid, drive: Uuid) -> Roster {
    Roster {
        users: vec![User {
            uuid: user,
            deleted: false,
        }],
        drives: vec![Drive {
            uuid: drive,
            kind: DriveKind::Private { owner: user },
            deleted: false,
        }],
        tags: (1..=9).collect(),
    }
}

/// A Vfs with a 5-byte append unit so small test files are aligned.
pub async fn fixture() -> Fixture {
    let scratch = tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).expect("scratch dir");
    let config = VfsConfig::new(scratch.path().join("drives"), scratch.path().join("tmp"))
        .with_append_unit(5);
    let vfs = Vfs::new(config).expect("vfs");
    let user = Uuid::new_v4();
    let drive = Uuid::new_v4();
    vfs.update_roster(base_roster(user, drive))
        .await
        .expect("roster");
    Fixture {
        vfs,
        user,
        drive,
        _scratch: scratch,
    }
}

/// Stages an upload temp file the way the routing layer would, returning
/// its path and declared fingerprint.
pub fn stage_upload(vfs: &Vfs, content: &[u8]) -> (PathBuf, Fingerprint) {
    let path = vfs
        .config()
        .temp_dir
        .join(format!("upload-{}", Uuid::new_v4().simple()));
    std::fs::write(&path, content).expect("stage upload");
    (path, Fingerprint::of_bytes(content))
}
