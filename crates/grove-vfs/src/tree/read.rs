//! Directory reconciliation.
//!
//! `read_dir` is the single point where index and disk meet: it enumerates
//! the backing directory, reads each entry's persistent stat record, and
//! diffs the result against the cached children. Every mutating operation
//! re-reads the affected directory before reporting success, so the index
//! never serves a success response from stale state.

use std::collections::{HashMap, HashSet};
use std::fs;

use tracing::{debug, warn};
use uuid::Uuid;

use super::arena::{NodeId, OptionNodeId};
use super::forest::Forest;
use super::node::Node;
use crate::error::{Result, VfsError};
use crate::storage::STAGING_PREFIX;
use crate::types::{EntryKind, EntryRecord};
use crate::xstat::{self, XStat};

impl Forest {
    /// Reconciles `dir` with its on-disk state and returns the fresh entry
    /// list, sorted by name.
    pub fn read_dir(&mut self, dir_id: NodeId) -> Result<Vec<EntryRecord>> {
        let dir_path = self.abs_path(dir_id)?;
        if self.node(dir_id).map(|n| n.is_dir()) != Some(true) {
            return Err(VfsError::NotFound("not an indexed directory".to_string()));
        }

        let mut disk: Vec<(String, XStat)> = Vec::new();
        for entry in fs::read_dir(&dir_path)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(dir = %dir_path.display(), "skipping non-utf8 entry name");
                continue;
            };
            if name.starts_with(STAGING_PREFIX) {
                continue;
            }
            let file_type = entry.file_type()?;
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }
            match xstat::read(&entry.path()) {
                Ok(stat) => disk.push((name, stat)),
                Err(error) => {
                    // The entry may have vanished between listing and stat.
                    warn!(dir = %dir_path.display(), name = %name, %error, "skipping unreadable entry");
                }
            }
        }
        let dir_mtime = xstat::mtime_ms(&fs::symlink_metadata(&dir_path)?);

        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stats: HashMap<Uuid, XStat> = HashMap::new();
        for (name, mut stat) in disk {
            let id = match self.node_by_uuid(stat.uuid) {
                Some(existing)
                    if seen.contains(&existing) || existing == dir_id || self.is_root(existing) =>
                {
                    // Identity duplicated on disk (e.g. an external copy
                    // carried the attribute along): mint a fresh one.
                    let fresh = Uuid::new_v4();
                    warn!(name = %name, old = %stat.uuid, new = %fresh, "re-identifying duplicated entry");
                    xstat::force_uuid(&dir_path.join(&name), fresh)?;
                    stat.uuid = fresh;
                    stat.hash = None;
                    stat.tags.clear();
                    self.attach_new(dir_id, &name, &stat)
                }
                Some(existing) => {
                    let parent = self.node(existing).and_then(|n| n.parent.to_option());
                    if parent != Some(dir_id) {
                        // Observed after a cross-directory move.
                        self.reparent(existing, dir_id);
                    }
                    if self.node(existing).map(|n| n.name.as_str()) != Some(name.as_str()) {
                        self.rename_node(existing, &name);
                    }
                    if stat.kind == EntryKind::File {
                        if self.node(existing).map(|n| n.is_dir()) == Some(true) {
                            // Type flipped underneath us: rebuild the node.
                            self.remove_subtree(existing);
                            self.attach_new(dir_id, &name, &stat)
                        } else {
                            self.refresh_file(existing, &stat);
                            existing
                        }
                    } else {
                        if self.node(existing).map(|n| n.is_dir()) == Some(false) {
                            self.remove_subtree(existing);
                            self.attach_new(dir_id, &name, &stat)
                        } else {
                            if let Some(dir) =
                                self.node_mut(existing).and_then(|n| n.as_dir_mut())
                            {
                                dir.archived = stat.archived;
                                dir.bctime = stat.bctime;
                                dir.bmtime = stat.bmtime;
                            }
                            existing
                        }
                    }
                }
                None => self.attach_new(dir_id, &name, &stat),
            };
            seen.insert(id);
            stats.insert(stat.uuid, stat);
        }

        // Anything cached but no longer listed is gone.
        let cached: Vec<NodeId> = self
            .node(dir_id)
            .and_then(|n| n.as_dir())
            .map(|d| d.children.clone())
            .unwrap_or_default();
        for child in cached {
            if !seen.contains(&child) {
                debug!(?child, "dropping vanished entry");
                self.remove_subtree(child);
            }
        }

        // Children are confirmed as of this mtime.
        if let Some(dir) = self.node_mut(dir_id).and_then(|n| n.as_dir_mut()) {
            dir.mtime = dir_mtime;
        }

        let children = self
            .node(dir_id)
            .and_then(|n| n.as_dir())
            .map(|d| d.children.clone())
            .unwrap_or_default();
        let records = children
            .iter()
            .filter_map(|&c| {
                let node = self.node(c)?;
                let mut record = node.record();
                // Child directories keep their cached (children-confirmed)
                // mtime internally; the listing shows the on-disk value.
                if let Some(stat) = stats.get(&node.uuid) {
                    record.mtime = stat.mtime;
                }
                Some(record)
            })
            .collect();
        Ok(records)
    }

    fn attach_new(&mut self, dir_id: NodeId, name: &str, stat: &XStat) -> NodeId {
        let node = match stat.kind {
            EntryKind::Directory => {
                let mut node =
                    Node::new_dir(stat.uuid, name.to_string(), OptionNodeId::some(dir_id));
                if let Some(dir) = node.as_dir_mut() {
                    dir.archived = stat.archived;
                    dir.bctime = stat.bctime;
                    dir.bmtime = stat.bmtime;
                }
                node
            }
            EntryKind::File => {
                Node::new_file(stat.uuid, name.to_string(), OptionNodeId::some(dir_id), stat)
            }
        };
        self.attach(dir_id, node)
    }
}
