//! The VFS facade: the public operation surface.
//!
//! Every operation takes the calling user plus the operation's parameters,
//! resolves the target directory honoring drive visibility and ACL rules,
//! performs the storage mutation, and then re-reads the affected directory
//! so success is never reported from stale index state.
//!
//! Lock discipline: resolution happens under short read locks which are
//! dropped before any disk work; the post-mutation reconciliation takes the
//! single write lock. Two racing mutations on the same directory are not
//! serialized by a mutex: the second one fails the storage layer's
//! collision check and both converge through the same re-read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::append::append_file;
use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::fingerprint::Fingerprint;
use crate::media::MediaMeta;
use crate::query::{
    scan_timeline, spill_records, walk_places, CompiledFilter, QueryRequest, QueryResult,
};
use crate::storage;
use crate::tree::{Forest, NodeId};
use crate::types::{EntryKind, EntryRecord, Policy, Resolution, Roster};
use crate::xstat;

/// Source of a cross-drive file/directory operation.
#[derive(Debug, Clone)]
pub struct SrcSpec {
    pub drive: Option<Uuid>,
    pub dir: Uuid,
    /// Expected identity of the named entry; a stale reference fails with
    /// `NotFound` instead of touching whatever took the name over.
    pub uuid: Option<Uuid>,
    pub name: String,
}

/// Destination of a cross-drive file/directory operation.
#[derive(Debug, Clone, Copy)]
pub struct DstSpec {
    pub drive: Option<Uuid>,
    pub dir: Uuid,
}

/// Per-name outcomes of a batch operation. Failures are reported in place;
/// the batch never aborts as a whole.
pub type NameResults = BTreeMap<String, Result<Resolution>>;

pub struct Vfs {
    config: VfsConfig,
    forest: RwLock<Forest>,
    roster: RwLock<Roster>,
}

impl Vfs {
    pub fn new(config: VfsConfig) -> Result<Self> {
        fs::create_dir_all(&config.drives_dir)?;
        fs::create_dir_all(&config.temp_dir)?;
        let forest = Forest::new(config.drives_dir.clone());
        Ok(Self {
            config,
            forest: RwLock::new(forest),
            roster: RwLock::new(Roster::default()),
        })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Roster reconciliation
    // -----------------------------------------------------------------------

    /// Applies a fresh user/drive/tag roster snapshot: roots are created
    /// for drives that became valid, pruned for drives that became
    /// inaccessible, and physically removed for drives marked deleted.
    ///
    /// This is the only path that creates or destroys roots; ordinary file
    /// operations never do.
    pub async fn update_roster(&self, roster: Roster) -> Result<()> {
        let valid: Vec<Uuid> = roster.valid_drives().map(|d| d.uuid).collect();
        {
            let mut forest = self.forest.write();
            for drive in roster.valid_drives() {
                if forest.node_by_uuid(drive.uuid).is_none() {
                    let path = self.config.drives_dir.join(drive.uuid.to_string());
                    fs::create_dir_all(&path)?;
                    xstat::force_uuid(&path, drive.uuid)?;
                    forest.create_root(drive.uuid)?;
                }
            }
            for uuid in forest.root_uuids() {
                if valid.contains(&uuid) {
                    continue;
                }
                let deleted = roster.drive(uuid).map(|d| d.deleted).unwrap_or(false);
                forest.delete_root(uuid);
                if deleted {
                    let path = self.config.drives_dir.join(uuid.to_string());
                    match fs::remove_dir_all(&path) {
                        Ok(()) => info!(%uuid, "deleted drive removed from disk"),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => warn!(%uuid, error = %e, "failed to remove deleted drive"),
                    }
                }
            }
        }
        *self.roster.write() = roster;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolves `(drive?, dir)` to a live directory node and its backing
    /// path. Unknown and invisible targets are indistinguishable
    /// (`NotFound`); a visible directory under a different drive than the
    /// caller named is `Moved`; a visible but unwritable target of a
    /// mutation is `PermissionDenied`.
    fn resolve_dir(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        for_write: bool,
    ) -> Result<(NodeId, PathBuf)> {
        let roster = self.roster.read();
        let forest = self.forest.read();
        let not_found = || VfsError::NotFound(format!("directory {dir}"));

        let id = forest.node_by_uuid(dir).ok_or_else(not_found)?;
        let node = forest.node(id).ok_or_else(not_found)?;
        if !node.is_dir() {
            return Err(not_found());
        }
        let root_id = forest.root_of(id).ok_or_else(not_found)?;
        let root_uuid = forest.node(root_id).ok_or_else(not_found)?.uuid;
        let record = roster.drive(root_uuid).ok_or_else(not_found)?;
        if !record.can_read(user) {
            return Err(not_found());
        }
        if let Some(requested) = drive {
            if requested != root_uuid {
                // Only report Moved when the caller may know the requested
                // drive exists at all.
                match roster.drive(requested) {
                    Some(d) if d.can_read(user) => return Err(VfsError::Moved(dir)),
                    _ => return Err(VfsError::NotFound(format!("drive {requested}"))),
                }
            }
        }
        if for_write && !record.can_write(user) {
            return Err(VfsError::PermissionDenied(format!(
                "drive {root_uuid} is not writable"
            )));
        }
        let path = forest.abs_path(id)?;
        Ok((id, path))
    }

    /// Resolves a query place. Places the caller cannot write are treated
    /// as not found, never silently skipped: existence must not leak.
    fn resolve_place(&self, user: Uuid, place: Uuid) -> Result<NodeId> {
        match self.resolve_dir(user, None, place, true) {
            Ok((id, _)) => Ok(id),
            Err(VfsError::PermissionDenied(_)) => {
                Err(VfsError::NotFound(format!("directory {place}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-reads `dir` and returns the entry carrying `uuid`.
    fn reread_and_find(&self, dir_id: NodeId, uuid: Uuid) -> Result<EntryRecord> {
        let mut forest = self.forest.write();
        let records = forest.read_dir(dir_id)?;
        records
            .into_iter()
            .find(|r| r.uuid == uuid)
            .ok_or_else(|| VfsError::NotFound(format!("entry {uuid}")))
    }

    fn reread(&self, dir_id: NodeId) -> Result<Vec<EntryRecord>> {
        self.forest.write().read_dir(dir_id)
    }

    // -----------------------------------------------------------------------
    // Directory operations
    // -----------------------------------------------------------------------

    /// READDIR: lists a directory, reconciling the index with disk.
    pub async fn readdir(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
    ) -> Result<Vec<EntryRecord>> {
        let (dir_id, _) = self.resolve_dir(user, drive, dir, false)?;
        self.reread(dir_id)
    }

    /// MKDIR: creates a subdirectory under the conflict policy.
    pub async fn mkdir(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        policy: Policy,
    ) -> Result<Resolution> {
        validate_name(name)?;
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let placed = storage::create_dir(&dir_path, name, policy)?;
        let record = self.reread_and_find(dir_id, placed.uuid)?;
        Ok(Resolution {
            record,
            kind: placed.kind,
        })
    }

    /// MKDIRS: batch directory creation; failures reported per name.
    pub async fn mkdirs(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        names: &[String],
        policy: Policy,
    ) -> Result<NameResults> {
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let mut placed: BTreeMap<String, Result<storage::Placed>> = BTreeMap::new();
        for name in names {
            let outcome = validate_name(name).and_then(|_| storage::create_dir(&dir_path, name, policy));
            placed.insert(name.clone(), outcome);
        }
        let records = self.reread(dir_id)?;
        Ok(placed
            .into_iter()
            .map(|(name, outcome)| {
                let resolution = outcome.and_then(|p| {
                    records
                        .iter()
                        .find(|r| r.uuid == p.uuid)
                        .cloned()
                        .map(|record| Resolution {
                            record,
                            kind: p.kind,
                        })
                        .ok_or_else(|| VfsError::NotFound(format!("entry {}", p.uuid)))
                });
                (name, resolution)
            })
            .collect())
    }

    /// RENAME: moves an entry to a new name within the same directory.
    pub async fn rename(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        from: &str,
        to: &str,
        policy: Policy,
    ) -> Result<Resolution> {
        validate_name(to)?;
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let src = child_on_disk(&dir_path, from)?;
        let stat = xstat::read(&src)?;
        let placed = match stat.kind {
            EntryKind::File => storage::move_file(&src, &dir_path, to, policy)?,
            EntryKind::Directory => storage::move_dir(&src, &dir_path, to, policy)?,
        };
        let record = self.reread_and_find(dir_id, placed.uuid)?;
        Ok(Resolution {
            record,
            kind: placed.kind,
        })
    }

    /// REMOVE: deletes a named entry (recursively for directories). Roots
    /// are never removable through this path.
    pub async fn remove(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
    ) -> Result<()> {
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let target = child_on_disk(&dir_path, name)?;
        let stat = xstat::read(&target)?;
        {
            let forest = self.forest.read();
            if let Some(id) = forest.node_by_uuid(stat.uuid) {
                if forest.is_root(id) {
                    return Err(VfsError::InvalidArgument(
                        "refusing to remove a drive root".to_string(),
                    ));
                }
            }
        }
        match stat.kind {
            EntryKind::Directory => fs::remove_dir_all(&target)?,
            EntryKind::File => fs::remove_file(&target)?,
        }
        self.reread(dir_id)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // File operations
    // -----------------------------------------------------------------------

    /// NEWFILE: publishes an uploaded temp file as a directory entry. The
    /// declared hash is verified against the temp file's actual content
    /// before anything is placed.
    pub async fn newfile(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        data: PathBuf,
        sha256: Fingerprint,
        policy: Policy,
    ) -> Result<Resolution> {
        validate_name(name)?;
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let actual = hash_file(data.clone()).await?;
        if actual != sha256 {
            return Err(VfsError::InvalidArgument(format!(
                "upload hash mismatch: declared {sha256}, found {actual}"
            )));
        }
        let placed = storage::create_file_from_temp(&dir_path, name, &data, &sha256, policy)?;
        let record = self.reread_and_find(dir_id, placed.uuid)?;
        Ok(Resolution {
            record,
            kind: placed.kind,
        })
    }

    /// APPEND: appends an uploaded segment to an aligned file under the
    /// optimistic hash/mtime protocol.
    pub async fn append(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        hash: Fingerprint,
        data: PathBuf,
        sha256: Fingerprint,
    ) -> Result<EntryRecord> {
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let target = child_on_disk(&dir_path, name)?;
        let config = self.config.clone();
        let name_owned = name.to_string();
        tokio::task::spawn_blocking(move || {
            append_file(&config, &target, &hash, &data, &sha256)
        })
        .await
        .map_err(join_error)??;
        let records = self.reread(dir_id)?;
        records
            .into_iter()
            .find(|r| r.name == name_owned)
            .ok_or_else(|| VfsError::NotFound(format!("entry {name_owned}")))
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// ADDTAGS: unions `tags` into the file's tag set.
    pub async fn add_tags(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        tags: &[u32],
    ) -> Result<EntryRecord> {
        self.mutate_tags(user, drive, dir, name, tags, |current, tags| {
            let mut next = current.to_vec();
            next.extend_from_slice(tags);
            next
        })
        .await
    }

    /// REMOVETAGS: subtracts `tags` from the file's tag set.
    pub async fn remove_tags(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        tags: &[u32],
    ) -> Result<EntryRecord> {
        self.mutate_tags(user, drive, dir, name, tags, |current, tags| {
            current
                .iter()
                .copied()
                .filter(|t| !tags.contains(t))
                .collect()
        })
        .await
    }

    /// SETTAGS: replaces the file's tag set. Setting the same set twice is
    /// a storage-layer no-op but still returns the current record.
    pub async fn set_tags(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        tags: &[u32],
    ) -> Result<EntryRecord> {
        self.mutate_tags(user, drive, dir, name, tags, |_, tags| tags.to_vec())
            .await
    }

    async fn mutate_tags(
        &self,
        user: Uuid,
        drive: Option<Uuid>,
        dir: Uuid,
        name: &str,
        tags: &[u32],
        combine: impl Fn(&[u32], &[u32]) -> Vec<u32>,
    ) -> Result<EntryRecord> {
        {
            let roster = self.roster.read();
            if let Some(unknown) = tags.iter().find(|t| !roster.tags.contains(t)) {
                return Err(VfsError::InvalidArgument(format!("unknown tag {unknown}")));
            }
        }
        let (dir_id, dir_path) = self.resolve_dir(user, drive, dir, true)?;
        let target = child_on_disk(&dir_path, name)?;
        let stat = xstat::read(&target)?;
        if stat.kind != EntryKind::File {
            return Err(VfsError::NotAFile(name.to_string()));
        }
        let mut next = combine(&stat.tags, tags);
        next.sort_unstable();
        next.dedup();
        let changed = xstat::set_tags(&target, &next)?;
        debug!(name, changed, "tag mutation");
        self.reread_and_find(dir_id, stat.uuid)
    }

    // -----------------------------------------------------------------------
    // Cross-drive copy / move
    // -----------------------------------------------------------------------

    /// CPFILE: clones a file into another directory under a fresh identity.
    pub async fn cpfile(
        &self,
        user: Uuid,
        src: SrcSpec,
        dst: DstSpec,
        policy: Policy,
    ) -> Result<Resolution> {
        let (_, src_dir_path) = self.resolve_dir(user, src.drive, src.dir, false)?;
        let (dst_id, dst_dir_path) = self.resolve_dir(user, dst.drive, dst.dir, true)?;
        let src_file = child_on_disk(&src_dir_path, &src.name)?;
        check_src_identity(&src_file, src.uuid)?;
        let placed = storage::copy_file(&src_file, &dst_dir_path, &src.name, policy)?;
        let record = self.reread_and_find(dst_id, placed.uuid)?;
        Ok(Resolution {
            record,
            kind: placed.kind,
        })
    }

    /// MVFILE: moves a file into another directory, identity preserved.
    pub async fn mvfile(
        &self,
        user: Uuid,
        src: SrcSpec,
        dst: DstSpec,
        policy: Policy,
    ) -> Result<Resolution> {
        let (src_id, src_dir_path) = self.resolve_dir(user, src.drive, src.dir, true)?;
        let (dst_id, dst_dir_path) = self.resolve_dir(user, dst.drive, dst.dir, true)?;
        let src_file = child_on_disk(&src_dir_path, &src.name)?;
        check_src_identity(&src_file, src.uuid)?;
        let placed = storage::move_file(&src_file, &dst_dir_path, &src.name, policy)?;
        self.reread(src_id)?;
        let record = self.reread_and_find(dst_id, placed.uuid)?;
        Ok(Resolution {
            record,
            kind: placed.kind,
        })
    }

    /// MVDIRS: moves a batch of named subdirectories into another
    /// directory; per-name outcomes, the batch never aborts as a whole.
    pub async fn mvdirs(
        &self,
        user: Uuid,
        src: DstSpec,
        names: &[String],
        dst: DstSpec,
        policy: Policy,
    ) -> Result<NameResults> {
        let (src_id, src_dir_path) = self.resolve_dir(user, src.drive, src.dir, true)?;
        let (dst_id, dst_dir_path) = self.resolve_dir(user, dst.drive, dst.dir, true)?;
        let mut placed: BTreeMap<String, Result<storage::Placed>> = BTreeMap::new();
        for name in names {
            let outcome = child_on_disk(&src_dir_path, name)
                .and_then(|p| storage::move_dir(&p, &dst_dir_path, name, policy));
            placed.insert(name.clone(), outcome);
        }
        self.reread(src_id)?;
        let records = self.reread(dst_id)?;
        Ok(placed
            .into_iter()
            .map(|(name, outcome)| {
                let resolution = outcome.and_then(|p| {
                    records
                        .iter()
                        .find(|r| r.uuid == p.uuid)
                        .cloned()
                        .map(|record| Resolution {
                            record,
                            kind: p.kind,
                        })
                        .ok_or_else(|| VfsError::NotFound(format!("entry {}", p.uuid)))
                });
                (name, resolution)
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// QUERY: chronological or hierarchical scan over the permitted places.
    /// Large record sets come back as [`QueryResult::Spilled`].
    pub async fn query(&self, user: Uuid, mut req: QueryRequest) -> Result<QueryResult> {
        if req.places.is_empty() {
            return Err(VfsError::InvalidArgument("no places given".to_string()));
        }
        if req.group_by_place {
            req.count_only = true;
        }
        let mut place_ids = Vec::with_capacity(req.places.len());
        for &place in &req.places {
            place_ids.push(self.resolve_place(user, place)?);
        }
        let filter = CompiledFilter::compile(&req)?;
        let result = {
            let forest = self.forest.read();
            if req.order.is_some() {
                scan_timeline(&forest, &place_ids, &req, &filter)?
            } else {
                walk_places(&forest, &place_ids, &req, &filter)?
            }
        };
        match result {
            QueryResult::Records(records) if records.len() > self.config.spill_threshold => {
                let path = spill_records(&self.config.temp_dir, &records)?;
                Ok(QueryResult::Spilled(path))
            }
            other => Ok(other),
        }
    }

    // -----------------------------------------------------------------------
    // Fingerprint surface
    // -----------------------------------------------------------------------

    /// Attaches probe-supplied media metadata to every indexed file with
    /// this fingerprint. Never blocks indexing; returns how many files were
    /// updated.
    pub async fn set_media(&self, hash: &Fingerprint, media: MediaMeta) -> usize {
        self.forest.write().set_media(hash, &media)
    }

    /// Looks up indexed files by fingerprint within the caller's permitted
    /// places. The place set is the explicit trust boundary: there is no
    /// anonymous, unfiltered variant.
    pub async fn files_by_fingerprint(
        &self,
        user: Uuid,
        places: &[Uuid],
        hash: &Fingerprint,
    ) -> Result<Vec<EntryRecord>> {
        let mut place_ids = Vec::with_capacity(places.len());
        for &place in places {
            place_ids.push(self.resolve_place(user, place)?);
        }
        let forest = self.forest.read();
        let Some(uuids) = forest.files_with_fingerprint(hash) else {
            return Ok(Vec::new());
        };
        Ok(uuids
            .iter()
            .filter_map(|&uuid| {
                let id = forest.node_by_uuid(uuid)?;
                forest.matched_place(id, &place_ids)?;
                forest.node(id).map(|n| n.record())
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
        || name.starts_with(storage::STAGING_PREFIX)
    {
        return Err(VfsError::InvalidArgument(format!("bad name: {name:?}")));
    }
    Ok(())
}

/// Maps a missing child to `NotFound` up front, so storage primitives only
/// ever see paths that existed a moment ago.
fn child_on_disk(dir_path: &Path, name: &str) -> Result<PathBuf> {
    validate_name(name)?;
    let path = dir_path.join(name);
    match fs::symlink_metadata(&path) {
        Ok(_) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VfsError::NotFound(format!("entry {name}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Verifies that the entry at `path` still carries the identity the caller
/// captured, failing a stale reference instead of touching a usurper.
fn check_src_identity(path: &Path, expected: Option<Uuid>) -> Result<()> {
    if let Some(expected) = expected {
        let stat = xstat::read(path)?;
        if stat.uuid != expected {
            return Err(VfsError::NotFound(format!("entry {expected}")));
        }
    }
    Ok(())
}

async fn hash_file(path: PathBuf) -> Result<Fingerprint> {
    tokio::task::spawn_blocking(move || Fingerprint::of_file(&path))
        .await
        .map_err(join_error)?
        .map_err(VfsError::from)
}

fn join_error(e: tokio::task::JoinError) -> VfsError {
    VfsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}
