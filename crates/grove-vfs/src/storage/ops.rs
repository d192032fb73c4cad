//! Underlying storage operations.
//!
//! Each primitive is atomic as observed by a concurrent reader: directories
//! are staged under a hidden name with their identity attribute already set
//! and then renamed into place; files are staged the same way (or arrive as
//! an upload temp file) and published with a no-replace rename. A failed
//! publish never leaves a half-initialized entry at the destination.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::cow;
use super::policy::{self, Outcome};
use crate::error::{Result, VfsError};
use crate::types::{EntryKind, Policy, ResolutionKind};
use crate::xstat;

/// Hidden-name prefix for staged entries; directory reads ignore these.
pub(crate) const STAGING_PREFIX: &str = ".grove-";

/// Result of a placement primitive: where the entry ended up, under which
/// name, and how the name was resolved.
#[derive(Debug)]
pub(crate) struct Placed {
    pub path: PathBuf,
    pub name: String,
    pub uuid: Uuid,
    pub kind: ResolutionKind,
}

fn staged_path(parent: &Path) -> PathBuf {
    parent.join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()))
}

fn skipped(parent: &Path, name: &str) -> Result<Placed> {
    let path = parent.join(name);
    let stat = xstat::read(&path)?;
    Ok(Placed {
        path,
        name: name.to_string(),
        uuid: stat.uuid,
        kind: ResolutionKind::Skipped,
    })
}

fn publish(staged: &Path, parent: &Path, name: String, uuid: Uuid, renamed: bool) -> Result<Placed> {
    let target = parent.join(&name);
    match cow::rename_noreplace(staged, &target) {
        Ok(()) => Ok(Placed {
            path: target,
            name,
            uuid,
            kind: if renamed {
                ResolutionKind::Renamed
            } else {
                ResolutionKind::AsRequested
            },
        }),
        Err(e) => {
            // Lost a race to a concurrent create. Withdraw staging entries;
            // a move source (published under its real name) must survive.
            let is_staging = staged
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(STAGING_PREFIX))
                .unwrap_or(false);
            if is_staging {
                if staged.is_dir() {
                    let _ = fs::remove_dir_all(staged);
                } else {
                    let _ = fs::remove_file(staged);
                }
            }
            if e.kind() == io::ErrorKind::AlreadyExists {
                Err(VfsError::Conflict(name))
            } else {
                Err(e.into())
            }
        }
    }
}

/// Creates a directory under `parent`, identity set before it becomes
/// visible under its final name.
pub(crate) fn create_dir(parent: &Path, name: &str, policy: Policy) -> Result<Placed> {
    match policy::resolve(parent, name, EntryKind::Directory, policy)? {
        Outcome::Skip => skipped(parent, name),
        Outcome::Proceed { name, renamed } => {
            let staged = staged_path(parent);
            fs::create_dir(&staged)?;
            let uuid = Uuid::new_v4();
            if let Err(e) = xstat::stamp_dir(&staged, uuid) {
                let _ = fs::remove_dir_all(&staged);
                return Err(e);
            }
            publish(&staged, parent, name, uuid, renamed)
        }
    }
}

/// Publishes an upload temp file as `parent/name`. The temp file is
/// consumed: renamed into place on success, deleted when the policy skips.
pub(crate) fn create_file_from_temp(
    parent: &Path,
    name: &str,
    data: &Path,
    hash: &crate::fingerprint::Fingerprint,
    policy: Policy,
) -> Result<Placed> {
    match policy::resolve(parent, name, EntryKind::File, policy)? {
        Outcome::Skip => {
            let _ = fs::remove_file(data);
            skipped(parent, name)
        }
        Outcome::Proceed { name, renamed } => {
            let meta = fs::symlink_metadata(data)?;
            if !meta.is_file() {
                return Err(VfsError::NotAFile(data.display().to_string()));
            }
            let uuid = Uuid::new_v4();
            xstat::stamp_file(data, uuid, hash, xstat::mtime_ms(&meta))?;
            publish(data, parent, name, uuid, renamed)
        }
    }
}

/// Moves a file to `parent/name`, keeping its identity record.
pub(crate) fn move_file(src: &Path, parent: &Path, name: &str, policy: Policy) -> Result<Placed> {
    let stat = xstat::read(src)?;
    if stat.kind != EntryKind::File {
        return Err(VfsError::NotAFile(src.display().to_string()));
    }
    match policy::resolve(parent, name, EntryKind::File, policy)? {
        Outcome::Skip => skipped(parent, name),
        Outcome::Proceed { name, renamed } => publish(src, parent, name, stat.uuid, renamed),
    }
}

/// Moves a directory (with everything beneath it) to `parent/name`.
pub(crate) fn move_dir(src: &Path, parent: &Path, name: &str, policy: Policy) -> Result<Placed> {
    let stat = xstat::read(src)?;
    if stat.kind != EntryKind::Directory {
        return Err(VfsError::NotFound(format!(
            "no directory at {}",
            src.display()
        )));
    }
    match policy::resolve(parent, name, EntryKind::Directory, policy)? {
        Outcome::Skip => skipped(parent, name),
        Outcome::Proceed { name, renamed } => publish(src, parent, name, stat.uuid, renamed),
    }
}

/// Clones a file's content to `parent/name` under a fresh identity.
///
/// Copy-on-write where the filesystem supports it: no data is physically
/// duplicated until one of the copies is modified.
pub(crate) fn copy_file(src: &Path, parent: &Path, name: &str, policy: Policy) -> Result<Placed> {
    let src_stat = xstat::read(src)?;
    if src_stat.kind != EntryKind::File {
        return Err(VfsError::NotAFile(src.display().to_string()));
    }
    match policy::resolve(parent, name, EntryKind::File, policy)? {
        Outcome::Skip => skipped(parent, name),
        Outcome::Proceed { name, renamed } => {
            let staged = staged_path(parent);
            let uuid = Uuid::new_v4();
            let stamp = (|| -> Result<()> {
                cow::clone_file(src, &staged)?;
                match &src_stat.hash {
                    Some(hash) => {
                        let staged_meta = fs::symlink_metadata(&staged)?;
                        xstat::stamp_file(&staged, uuid, hash, xstat::mtime_ms(&staged_meta))
                    }
                    None => xstat::force_uuid(&staged, uuid),
                }
            })();
            if let Err(e) = stamp {
                let _ = fs::remove_file(&staged);
                return Err(e);
            }
            publish(&staged, parent, name, uuid, renamed)
        }
    }
}
