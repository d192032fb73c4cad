//! Naming-collision resolution.
//!
//! Before any destructive action, create/rename/move primitives probe the
//! destination for an entry of the requested name and consult the caller's
//! [`Policy`]: the `same` half governs collisions between entries of the
//! same type, the `diff` half collisions across types.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, VfsError};
use crate::types::{EntryKind, Policy, PolicyAction};

/// How a probed collision was resolved.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Proceed under `name` (the requested one, or a disambiguated one).
    Proceed { name: String, renamed: bool },
    /// Leave the existing entry alone and report it.
    Skip,
}

pub(crate) fn resolve(
    parent: &Path,
    name: &str,
    incoming: EntryKind,
    policy: Policy,
) -> Result<Outcome> {
    match fs::symlink_metadata(parent.join(name)) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Outcome::Proceed {
            name: name.to_string(),
            renamed: false,
        }),
        Err(e) => Err(e.into()),
        Ok(meta) => {
            let same = meta.is_dir() == (incoming == EntryKind::Directory);
            let action = if same { policy.same } else { policy.diff };
            match action {
                None => Err(VfsError::Conflict(name.to_string())),
                Some(PolicyAction::Skip) => Ok(Outcome::Skip),
                Some(PolicyAction::Rename) => Ok(Outcome::Proceed {
                    name: available_name(parent, name, incoming)?,
                    renamed: true,
                }),
            }
        }
    }
}

/// Deterministically picks the first non-colliding variant of `name`:
/// `name (2)`, `name (3)`, ... with the extension preserved for files.
fn available_name(parent: &Path, name: &str, incoming: EntryKind) -> Result<String> {
    let (stem, ext) = match incoming {
        EntryKind::Directory => (name, None),
        EntryKind::File => match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        },
    };
    for i in 2u32.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        match fs::symlink_metadata(parent.join(&candidate)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(e.into()),
            Ok(_) => continue,
        }
    }
    unreachable!("u32 namespace exhausted")
}
