//! Directory and file operation flows against a real scratch filesystem.

mod common;

use common::{fixture, stage_upload};
use grove_vfs::{
    DstSpec, EntryKind, Policy, PolicyAction, ResolutionKind, SrcSpec, VfsError,
};

#[tokio::test]
async fn mkdir_then_readdir_lists_exactly_one_new_entry() {
    let fx = fixture().await;
    let made = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    assert_eq!(made.kind, ResolutionKind::AsRequested);
    assert_eq!(made.record.name, "docs");
    assert_eq!(made.record.kind, EntryKind::Directory);

    let entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].uuid, made.record.uuid);
}

#[tokio::test]
async fn conflicting_mkdir_with_null_policy_fails_and_changes_nothing() {
    let fx = fixture().await;
    fx.vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    let err = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Conflict(_)));
    let entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn conflicting_mkdir_with_rename_policy_produces_two_identities() {
    let fx = fixture().await;
    let policy = Policy::new(Some(PolicyAction::Rename), None);
    let first = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", policy)
        .await
        .unwrap();
    let second = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", policy)
        .await
        .unwrap();
    assert_eq!(second.kind, ResolutionKind::Renamed);
    assert_eq!(second.record.name, "docs (2)");
    assert_ne!(first.record.uuid, second.record.uuid);
    assert_eq!(
        fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn skip_policy_reports_the_existing_entry() {
    let fx = fixture().await;
    let first = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    let second = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::skip_both())
        .await
        .unwrap();
    assert_eq!(second.kind, ResolutionKind::Skipped);
    assert_eq!(second.record.uuid, first.record.uuid);
}

#[tokio::test]
async fn newfile_publishes_upload_with_declared_hash() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    let placed = fx
        .vfs
        .newfile(
            fx.user, None, fx.drive, "hello.txt", data, hash.clone(), Policy::FAIL,
        )
        .await
        .unwrap();
    assert_eq!(placed.record.kind, EntryKind::File);
    assert_eq!(placed.record.size, 5);
    assert_eq!(placed.record.hash.as_ref(), Some(&hash));
}

#[tokio::test]
async fn newfile_rejects_wrong_declared_hash() {
    let fx = fixture().await;
    let (data, _) = stage_upload(&fx.vfs, b"hello");
    let (_, wrong_hash) = stage_upload(&fx.vfs, b"other");
    let err = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "hello.txt", data, wrong_hash, Policy::FAIL)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
    assert!(fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_preserves_identity() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    let placed = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash, Policy::FAIL)
        .await
        .unwrap();
    let renamed = fx
        .vfs
        .rename(fx.user, None, fx.drive, "a.txt", "b.txt", Policy::FAIL)
        .await
        .unwrap();
    assert_eq!(renamed.record.uuid, placed.record.uuid);
    assert_eq!(renamed.record.name, "b.txt");
    let entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "b.txt");
}

#[tokio::test]
async fn remove_drops_entry_and_its_subtree() {
    let fx = fixture().await;
    let docs = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    fx.vfs
        .mkdir(fx.user, None, docs.record.uuid, "inner", Policy::FAIL)
        .await
        .unwrap();
    fx.vfs.remove(fx.user, None, fx.drive, "docs").await.unwrap();
    assert!(fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap().is_empty());
    // The removed directory is no longer resolvable.
    let err = fx
        .vfs
        .readdir(fx.user, None, docs.record.uuid)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[tokio::test]
async fn remove_missing_entry_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .vfs
        .remove(fx.user, None, fx.drive, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[tokio::test]
async fn tag_roundtrip_restores_original_set() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash, Policy::FAIL)
        .await
        .unwrap();

    let before = fx
        .vfs
        .set_tags(fx.user, None, fx.drive, "a.txt", &[1, 2])
        .await
        .unwrap();
    assert_eq!(before.tags, vec![1, 2]);

    let added = fx
        .vfs
        .add_tags(fx.user, None, fx.drive, "a.txt", &[3, 4])
        .await
        .unwrap();
    assert_eq!(added.tags, vec![1, 2, 3, 4]);

    let restored = fx
        .vfs
        .remove_tags(fx.user, None, fx.drive, "a.txt", &[3, 4])
        .await
        .unwrap();
    assert_eq!(restored.tags, before.tags);
}

#[tokio::test]
async fn settags_twice_is_idempotent() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash, Policy::FAIL)
        .await
        .unwrap();
    let first = fx
        .vfs
        .set_tags(fx.user, None, fx.drive, "a.txt", &[2, 1, 2])
        .await
        .unwrap();
    assert_eq!(first.tags, vec![1, 2]);
    let second = fx
        .vfs
        .set_tags(fx.user, None, fx.drive, "a.txt", &[1, 2])
        .await
        .unwrap();
    assert_eq!(second.tags, vec![1, 2]);
    assert_eq!(second.uuid, first.uuid);
}

#[tokio::test]
async fn unknown_tag_ids_are_rejected() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash, Policy::FAIL)
        .await
        .unwrap();
    let err = fx
        .vfs
        .add_tags(fx.user, None, fx.drive, "a.txt", &[99])
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
}

#[tokio::test]
async fn cpfile_clones_content_under_fresh_identity() {
    let fx = fixture().await;
    let docs = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    let original = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash.clone(), Policy::FAIL)
        .await
        .unwrap();

    let copy = fx
        .vfs
        .cpfile(
            fx.user,
            SrcSpec {
                drive: None,
                dir: fx.drive,
                uuid: Some(original.record.uuid),
                name: "a.txt".to_string(),
            },
            DstSpec {
                drive: None,
                dir: docs.record.uuid,
            },
            Policy::FAIL,
        )
        .await
        .unwrap();
    assert_ne!(copy.record.uuid, original.record.uuid);
    assert_eq!(copy.record.hash, Some(hash));
    assert_eq!(copy.record.size, 5);
    // Source still listed at the original location.
    let entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    assert!(entries.iter().any(|r| r.uuid == original.record.uuid));
}

#[tokio::test]
async fn mvfile_moves_identity_across_directories() {
    let fx = fixture().await;
    let docs = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "docs", Policy::FAIL)
        .await
        .unwrap();
    let (data, hash) = stage_upload(&fx.vfs, b"hello");
    let original = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "a.txt", data, hash, Policy::FAIL)
        .await
        .unwrap();

    let moved = fx
        .vfs
        .mvfile(
            fx.user,
            SrcSpec {
                drive: None,
                dir: fx.drive,
                uuid: None,
                name: "a.txt".to_string(),
            },
            DstSpec {
                drive: None,
                dir: docs.record.uuid,
            },
            Policy::FAIL,
        )
        .await
        .unwrap();
    assert_eq!(moved.record.uuid, original.record.uuid);
    let root_entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    assert!(root_entries.iter().all(|r| r.name != "a.txt"));
    let docs_entries = fx
        .vfs
        .readdir(fx.user, None, docs.record.uuid)
        .await
        .unwrap();
    assert!(docs_entries.iter().any(|r| r.uuid == original.record.uuid));
}

#[tokio::test]
async fn mvdirs_reports_per_name_outcomes() {
    let fx = fixture().await;
    let dst = fx
        .vfs
        .mkdir(fx.user, None, fx.drive, "dst", Policy::FAIL)
        .await
        .unwrap();
    fx.vfs
        .mkdir(fx.user, None, fx.drive, "one", Policy::FAIL)
        .await
        .unwrap();
    fx.vfs
        .mkdir(fx.user, None, fx.drive, "two", Policy::FAIL)
        .await
        .unwrap();

    let results = fx
        .vfs
        .mvdirs(
            fx.user,
            DstSpec {
                drive: None,
                dir: fx.drive,
            },
            &["one".to_string(), "ghost".to_string(), "two".to_string()],
            DstSpec {
                drive: None,
                dir: dst.record.uuid,
            },
            Policy::FAIL,
        )
        .await
        .unwrap();

    assert!(results["one"].is_ok());
    assert!(results["two"].is_ok());
    assert!(matches!(
        results["ghost"].as_ref().unwrap_err(),
        VfsError::NotFound(_)
    ));
    let dst_entries = fx
        .vfs
        .readdir(fx.user, None, dst.record.uuid)
        .await
        .unwrap();
    assert_eq!(dst_entries.len(), 2);
}

#[tokio::test]
async fn mkdirs_batch_reports_per_name() {
    let fx = fixture().await;
    fx.vfs
        .mkdir(fx.user, None, fx.drive, "taken", Policy::FAIL)
        .await
        .unwrap();
    let results = fx
        .vfs
        .mkdirs(
            fx.user,
            None,
            fx.drive,
            &["fresh".to_string(), "taken".to_string(), "bad/name".to_string()],
            Policy::FAIL,
        )
        .await
        .unwrap();
    assert!(results["fresh"].is_ok());
    assert!(matches!(
        results["taken"].as_ref().unwrap_err(),
        VfsError::Conflict(_)
    ));
    assert!(matches!(
        results["bad/name"].as_ref().unwrap_err(),
        VfsError::InvalidArgument(_)
    ));
}
