//! Append: the content-addressed integrity protocol.
//!
//! Append is only permitted while the target's size is an exact multiple of
//! the configured alignment unit and its current fingerprint matches the
//! one the caller captured (optimistic concurrency). The new content is
//! staged as target-clone + segment-concat, the target's modification time
//! is re-checked to detect a second writer, and the staged file atomically
//! replaces the target.
//!
//! The resulting fingerprint follows the incremental scheme pinned in
//! [`Fingerprint::combine`]; an originally empty target simply takes the
//! segment's fingerprint.

use std::fs;
use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::fingerprint::Fingerprint;
use crate::storage;
use crate::types::EntryKind;
use crate::xstat;

/// Appends the staged segment at `data` to `target`.
///
/// `expected` is the caller's captured fingerprint of the target;
/// `data_hash` the declared fingerprint of the segment, verified here. The
/// segment temp file is consumed on success. Blocking: the facade runs this
/// via `spawn_blocking`.
pub(crate) fn append_file(
    config: &VfsConfig,
    target: &Path,
    expected: &Fingerprint,
    data: &Path,
    data_hash: &Fingerprint,
) -> Result<Fingerprint> {
    let stat = xstat::read(target)?;
    if stat.kind != EntryKind::File {
        return Err(VfsError::IsADirectory(target.display().to_string()));
    }
    if stat.size % config.append_unit != 0 {
        return Err(VfsError::Misaligned {
            size: stat.size,
            unit: config.append_unit,
        });
    }
    match &stat.hash {
        Some(current) if current == expected => {}
        Some(current) => {
            return Err(VfsError::HashMismatch {
                expected: expected.to_string(),
                actual: current.to_string(),
            })
        }
        None => {
            // No fresh fingerprint on record; the precondition cannot hold.
            return Err(VfsError::HashMismatch {
                expected: expected.to_string(),
                actual: "<none>".to_string(),
            });
        }
    }

    let actual_segment = Fingerprint::of_file(data)?;
    if actual_segment != *data_hash {
        return Err(VfsError::InvalidArgument(format!(
            "segment hash mismatch: declared {data_hash}, found {actual_segment}"
        )));
    }

    // Snapshot of the target as of the successful precondition check.
    let observed = xstat::mtime_raw(&fs::symlink_metadata(target)?);

    let staged = config
        .temp_dir
        .join(format!("append-{}", Uuid::new_v4().simple()));
    let commit = (|| {
        storage::clone_file(target, &staged)?;
        storage::append_contents(&staged, data)?;

        let new_hash = if stat.size == 0 {
            data_hash.clone()
        } else {
            expected.combine(data_hash)
        };
        let staged_mtime = xstat::mtime_ms(&fs::symlink_metadata(&staged)?);
        xstat::stamp_replacement(&staged, stat.uuid, &new_hash, staged_mtime, &stat.tags)?;

        // The clone/concat work ran outside the index's serialization
        // point; a second writer shows up as a changed mtime.
        let current = xstat::mtime_raw(&fs::symlink_metadata(target)?);
        if current != observed {
            return Err(VfsError::Race(target.display().to_string()));
        }

        fs::rename(&staged, target)?;
        Ok(new_hash)
    })();

    match commit {
        Ok(new_hash) => {
            let _ = fs::remove_file(data);
            debug!(target = %target.display(), %new_hash, "append committed");
            Ok(new_hash)
        }
        Err(e) => {
            let _ = fs::remove_file(&staged);
            Err(e)
        }
    }
}
