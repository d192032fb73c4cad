//! The Forest: owner of every per-drive node tree plus the secondary
//! orderings derived from them.
//!
//! Ownership is strictly arena-style: the Forest holds the only owning
//! reference to every node; parents and children point at each other with
//! arena ids. Besides the trees it maintains a global `uuid -> node` map, a
//! chronologically sorted sequence of all indexed files keyed by
//! `(mtime, uuid)`, and a fingerprint -> file-set map for deduplication and
//! media lookup. All three are mutated only during directory reconciliation
//! and root creation/removal.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use tracing::info;
use uuid::Uuid;

use super::arena::{Arena, NodeId, OptionNodeId};
use super::node::{Node, NodeKind};
use crate::error::{Result, VfsError};
use crate::fingerprint::Fingerprint;

/// Timeline key: ascending `(mtime, uuid)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeKey {
    pub mtime: i64,
    pub uuid: Uuid,
}

#[derive(Debug)]
pub struct Forest {
    drives_dir: PathBuf,
    arena: Arena<Node>,
    /// Drive uuid -> root node. Deterministic iteration order.
    roots: BTreeMap<Uuid, NodeId>,
    uuid_map: HashMap<Uuid, NodeId>,
    /// All indexed files, ascending by `(mtime, uuid)`; binary searched.
    timeline: Vec<TimeKey>,
    fingerprints: HashMap<Fingerprint, BTreeSet<Uuid>>,
}

impl Forest {
    pub fn new(drives_dir: PathBuf) -> Self {
        Self {
            drives_dir,
            arena: Arena::new(),
            roots: BTreeMap::new(),
            uuid_map: HashMap::new(),
            timeline: Vec::new(),
            fingerprints: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    pub fn node_by_uuid(&self, uuid: Uuid) -> Option<NodeId> {
        self.uuid_map.get(&uuid).copied()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.parent.to_option().is_none())
            .unwrap_or(false)
    }

    pub fn root_uuids(&self) -> Vec<Uuid> {
        self.roots.keys().copied().collect()
    }

    /// The root node owning `id`.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.parent.to_option() {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    /// Root-to-node name chain; the root's name is its drive uuid.
    pub fn name_chain(&self, id: NodeId) -> Option<Vec<String>> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            segments.push(node.name.clone());
            match node.parent.to_option() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        Some(segments)
    }

    /// Absolute on-disk path of a node.
    pub fn abs_path(&self, id: NodeId) -> Result<PathBuf> {
        let chain = self
            .name_chain(id)
            .ok_or_else(|| VfsError::NotFound("node no longer indexed".to_string()))?;
        let mut path = self.drives_dir.clone();
        path.extend(chain.iter());
        Ok(path)
    }

    /// Name path of `id` strictly below `place`. `Some(vec![])` when
    /// `id == place`, `None` when `place` is not an ancestor.
    pub fn namepath_below(&self, id: NodeId, place: NodeId) -> Option<Vec<String>> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            if current == place {
                segments.reverse();
                return Some(segments);
            }
            let node = self.node(current)?;
            segments.push(node.name.clone());
            current = node.parent.to_option()?;
        }
    }

    /// Index of the first place in `places` that is a proper ancestor of
    /// `id`.
    pub fn matched_place(&self, id: NodeId, places: &[NodeId]) -> Option<usize> {
        let mut current = self.node(id)?.parent.to_option();
        let mut chain = Vec::new();
        while let Some(ancestor) = current {
            chain.push(ancestor);
            current = self.node(ancestor)?.parent.to_option();
        }
        places.iter().position(|place| chain.contains(place))
    }

    pub fn timeline(&self) -> &[TimeKey] {
        &self.timeline
    }

    pub fn files_with_fingerprint(&self, hash: &Fingerprint) -> Option<&BTreeSet<Uuid>> {
        self.fingerprints.get(hash)
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    /// Adds a root for a drive. Its uuid is the drive's uuid and its name
    /// (path segment under the drives directory) is that uuid rendered.
    pub fn create_root(&mut self, uuid: Uuid) -> Result<NodeId> {
        if self.uuid_map.contains_key(&uuid) {
            return Err(VfsError::InvalidArgument(format!(
                "root {uuid} already exists"
            )));
        }
        let node = Node::new_dir(uuid, uuid.to_string(), OptionNodeId::none());
        let id = self.arena.insert(node);
        self.roots.insert(uuid, id);
        self.uuid_map.insert(uuid, id);
        info!(%uuid, "root created");
        Ok(id)
    }

    /// Detaches and discards a root and everything beneath it.
    pub fn delete_root(&mut self, uuid: Uuid) {
        if let Some(id) = self.roots.remove(&uuid) {
            self.remove_subtree(id);
            info!(%uuid, "root removed");
        }
    }

    // -----------------------------------------------------------------------
    // Structural mutation (reconciliation only)
    // -----------------------------------------------------------------------

    /// Inserts `node` into the arena and links it as a child of `parent`,
    /// keeping the children sorted by name.
    pub(crate) fn attach(&mut self, parent: NodeId, node: Node) -> NodeId {
        let uuid = node.uuid;
        let name = node.name.clone();
        let is_file = !node.is_dir();
        let file_key = node.as_file().and_then(|f| {
            (f.mtime >= 0).then_some(TimeKey {
                mtime: f.mtime,
                uuid,
            })
        });
        let hash = node.as_file().and_then(|f| f.hash.clone());

        let id = self.arena.insert(node);
        self.uuid_map.insert(uuid, id);
        self.link_child(parent, id, &name);
        if is_file {
            if let Some(key) = file_key {
                self.timeline_insert(key);
            }
            if let Some(hash) = hash {
                self.fingerprints.entry(hash).or_default().insert(uuid);
            }
        }
        id
    }

    /// Removes `id` and all of its descendants from every structure.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        // Unlink from the parent first, then drop the subtree bottom-up.
        if let Some(parent) = self.node(id).and_then(|n| n.parent.to_option()) {
            self.unlink_child(parent, id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            if let Some(dir) = node.as_dir() {
                stack.extend(dir.children.iter().copied());
            }
            let node = self
                .arena
                .try_remove(current)
                .expect("subtree node present");
            self.uuid_map.remove(&node.uuid);
            if let NodeKind::File(file) = &node.kind {
                if file.mtime >= 0 {
                    self.timeline_remove(TimeKey {
                        mtime: file.mtime,
                        uuid: node.uuid,
                    });
                }
                if let Some(hash) = &file.hash {
                    self.fingerprint_remove(hash, node.uuid);
                }
            }
        }
    }

    /// Moves `id` under a new parent (cross-directory move observed during
    /// reconciliation). The subtree and its secondary-index entries are
    /// preserved.
    pub(crate) fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        let Some(node) = self.node(id) else { return };
        let name = node.name.clone();
        if let Some(old_parent) = node.parent.to_option() {
            self.unlink_child(old_parent, id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = OptionNodeId::some(new_parent);
        }
        self.link_child(new_parent, id, &name);
    }

    /// Renames `id` in place, keeping its parent's children sorted.
    pub(crate) fn rename_node(&mut self, id: NodeId, new_name: &str) {
        let Some(node) = self.node(id) else { return };
        let parent = node.parent.to_option();
        if let Some(parent) = parent {
            self.unlink_child(parent, id);
        }
        if let Some(node) = self.node_mut(id) {
            node.name = new_name.to_string();
            if let Some(file) = node.as_file_mut() {
                // The media class follows the extension.
                match crate::media::media_kind_of(new_name) {
                    Some(kind) => match &mut file.media {
                        Some(meta) => meta.kind = kind,
                        None => {
                            file.media = Some(crate::media::MediaMeta {
                                kind,
                                width: None,
                                height: None,
                                duration_ms: None,
                            })
                        }
                    },
                    None => file.media = None,
                }
            }
        }
        if let Some(parent) = parent {
            self.link_child(parent, id, new_name);
        }
    }

    /// Refreshes a file node's payload from a fresh stat, repositioning it
    /// in the timeline and fingerprint map as needed.
    pub(crate) fn refresh_file(&mut self, id: NodeId, stat: &crate::xstat::XStat) {
        let Some(node) = self.node(id) else { return };
        let uuid = node.uuid;
        let Some(file) = node.as_file() else { return };
        let old_mtime = file.mtime;
        let old_hash = file.hash.clone();

        if old_mtime != stat.mtime {
            if old_mtime >= 0 {
                self.timeline_remove(TimeKey {
                    mtime: old_mtime,
                    uuid,
                });
            }
            if stat.mtime >= 0 {
                self.timeline_insert(TimeKey {
                    mtime: stat.mtime,
                    uuid,
                });
            }
        }
        if old_hash != stat.hash {
            if let Some(hash) = &old_hash {
                self.fingerprint_remove(hash, uuid);
            }
            if let Some(hash) = &stat.hash {
                self.fingerprints.entry(hash.clone()).or_default().insert(uuid);
            }
        }
        if let Some(file) = self.node_mut(id).and_then(|n| n.as_file_mut()) {
            file.mtime = stat.mtime;
            file.size = stat.size;
            file.hash = stat.hash.clone();
            file.tags = stat.tags.clone();
        }
    }

    /// Attaches probe-supplied media metadata to every indexed file whose
    /// fingerprint matches. Returns how many nodes were updated.
    pub(crate) fn set_media(&mut self, hash: &Fingerprint, media: &crate::media::MediaMeta) -> usize {
        let Some(uuids) = self.fingerprints.get(hash) else {
            return 0;
        };
        let ids: Vec<NodeId> = uuids
            .iter()
            .filter_map(|u| self.uuid_map.get(u).copied())
            .collect();
        let mut updated = 0;
        for id in ids {
            if let Some(file) = self.node_mut(id).and_then(|n| n.as_file_mut()) {
                file.media = Some(media.clone());
                updated += 1;
            }
        }
        updated
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn link_child(&mut self, parent: NodeId, id: NodeId, name: &str) {
        let Some(dir) = self.node(parent).and_then(|n| n.as_dir()) else {
            return;
        };
        let children = dir.children.clone();
        let pos = children.partition_point(|&c| {
            self.node(c).map(|n| n.name.as_str() < name).unwrap_or(false)
        });
        if let Some(dir) = self.node_mut(parent).and_then(|n| n.as_dir_mut()) {
            dir.children.insert(pos, id);
        }
    }

    fn unlink_child(&mut self, parent: NodeId, id: NodeId) {
        if let Some(dir) = self.node_mut(parent).and_then(|n| n.as_dir_mut()) {
            dir.children.retain(|&c| c != id);
        }
    }

    fn timeline_insert(&mut self, key: TimeKey) {
        if let Err(pos) = self.timeline.binary_search(&key) {
            self.timeline.insert(pos, key);
        }
    }

    fn timeline_remove(&mut self, key: TimeKey) {
        if let Ok(pos) = self.timeline.binary_search(&key) {
            self.timeline.remove(pos);
        }
    }

    fn fingerprint_remove(&mut self, hash: &Fingerprint, uuid: Uuid) {
        if let Some(set) = self.fingerprints.get_mut(hash) {
            set.remove(&uuid);
            if set.is_empty() {
                self.fingerprints.remove(hash);
            }
        }
    }
}
