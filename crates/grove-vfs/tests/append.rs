//! Append protocol: alignment, hash preconditions, and the pinned
//! incremental-fingerprint scheme.

mod common;

use common::{fixture, stage_upload};
use grove_vfs::{Fingerprint, Policy, VfsError};

/// combine(sha256("hello"), sha256("world")), precomputed.
const HELLO_WORLD_COMBINED: &str =
    "7305db9b2abccd706c256db3d97e5ff48d677cfe4d3a5904afb7da0e3950e1e2";

#[tokio::test]
async fn append_combines_fingerprints_per_the_pinned_scheme() {
    let fx = fixture().await; // 5-byte append unit
    let (data, hello) = stage_upload(&fx.vfs, b"hello");
    let placed = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "log", data, hello.clone(), Policy::FAIL)
        .await
        .unwrap();

    let (segment, world) = stage_upload(&fx.vfs, b"world");
    let updated = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", hello.clone(), segment, world)
        .await
        .unwrap();

    assert_eq!(updated.uuid, placed.record.uuid);
    assert_eq!(updated.size, 10);
    let new_hash = updated.hash.expect("appended file keeps a fingerprint");
    assert_eq!(new_hash.as_str(), HELLO_WORLD_COMBINED);
    assert_ne!(new_hash, hello);
}

#[tokio::test]
async fn append_to_empty_file_takes_the_segment_fingerprint() {
    let fx = fixture().await;
    let (data, empty_hash) = stage_upload(&fx.vfs, b"");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "log", data, empty_hash.clone(), Policy::FAIL)
        .await
        .unwrap();

    let (segment, world) = stage_upload(&fx.vfs, b"world");
    let updated = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", empty_hash, segment, world.clone())
        .await
        .unwrap();
    assert_eq!(updated.hash, Some(world));
    assert_eq!(updated.size, 5);
}

#[tokio::test]
async fn misaligned_target_is_refused() {
    let fx = fixture().await;
    let (data, hash) = stage_upload(&fx.vfs, b"abc"); // 3 bytes, unit is 5
    fx.vfs
        .newfile(fx.user, None, fx.drive, "log", data, hash.clone(), Policy::FAIL)
        .await
        .unwrap();

    let (segment, world) = stage_upload(&fx.vfs, b"world");
    let err = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", hash, segment, world)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Misaligned { size: 3, unit: 5 }));
}

#[tokio::test]
async fn stale_hash_fails_and_leaves_target_untouched() {
    let fx = fixture().await;
    let (data, hello) = stage_upload(&fx.vfs, b"hello");
    let placed = fx
        .vfs
        .newfile(fx.user, None, fx.drive, "log", data, hello.clone(), Policy::FAIL)
        .await
        .unwrap();

    let stale = Fingerprint::of_bytes(b"something else entirely");
    let (segment, world) = stage_upload(&fx.vfs, b"world");
    let err = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", stale, segment, world)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::HashMismatch { .. }));

    let entries = fx.vfs.readdir(fx.user, None, fx.drive).await.unwrap();
    let record = entries.iter().find(|r| r.name == "log").unwrap();
    assert_eq!(record.uuid, placed.record.uuid);
    assert_eq!(record.size, 5);
    assert_eq!(record.hash, Some(hello));
}

#[tokio::test]
async fn append_rejects_lying_segment_hash() {
    let fx = fixture().await;
    let (data, hello) = stage_upload(&fx.vfs, b"hello");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "log", data, hello.clone(), Policy::FAIL)
        .await
        .unwrap();

    let (segment, _) = stage_upload(&fx.vfs, b"world");
    let lying = Fingerprint::of_bytes(b"not world");
    let err = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", hello, segment, lying)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
}

#[tokio::test]
async fn append_preserves_tags() {
    let fx = fixture().await;
    let (data, hello) = stage_upload(&fx.vfs, b"hello");
    fx.vfs
        .newfile(fx.user, None, fx.drive, "log", data, hello.clone(), Policy::FAIL)
        .await
        .unwrap();
    fx.vfs
        .set_tags(fx.user, None, fx.drive, "log", &[4, 7])
        .await
        .unwrap();

    let (segment, world) = stage_upload(&fx.vfs, b"world");
    let updated = fx
        .vfs
        .append(fx.user, None, fx.drive, "log", hello, segment, world)
        .await
        .unwrap();
    assert_eq!(updated.tags, vec![4, 7]);
}
