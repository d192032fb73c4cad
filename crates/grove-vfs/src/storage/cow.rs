//! Copy-on-write file primitives.
//!
//! On Linux these use `FICLONE` (reflink) and `copy_file_range`, which on
//! extent-based filesystems share data blocks instead of copying them. Both
//! degrade to a plain byte copy when the backing filesystem lacks the
//! feature, so the rest of the core never has to care.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

#[cfg(target_os = "linux")]
use std::os::fd::AsRawFd;

/// Clones `src` into a fresh file at `dst` (which must not exist yet as far
/// as the caller is concerned; it is created/truncated here).
pub fn clone_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut src_file = File::open(src)?;
    let mut dst_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)?;
    if try_reflink(&src_file, &dst_file)? {
        return Ok(());
    }
    io::copy(&mut src_file, &mut dst_file)?;
    Ok(())
}

/// Appends the full content of `src` after the current end of `dst`.
///
/// Returns the number of bytes appended.
pub fn append_contents(dst: &Path, src: &Path) -> io::Result<u64> {
    let mut src_file = File::open(src)?;
    let len = src_file.metadata()?.len();
    // copy_file_range refuses O_APPEND descriptors, so seek instead.
    let mut dst_file = OpenOptions::new().write(true).read(true).open(dst)?;
    dst_file.seek(SeekFrom::End(0))?;
    if try_copy_range(&src_file, &dst_file, len)? {
        return Ok(len);
    }
    io::copy(&mut src_file, &mut dst_file)
}

/// Renames `src` to `dst`, failing with `AlreadyExists` if `dst` exists.
pub fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    rename_noreplace_impl(src, dst)
}

// ---------------------------------------------------------------------------
// Linux fast paths
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
fn try_reflink(src: &File, dst: &File) -> io::Result<bool> {
    // From linux/fs.h: _IOW(0x94, 9, int)
    const FICLONE: libc::c_ulong = 0x4004_9409;
    let rc = unsafe { libc::ioctl(dst.as_raw_fd(), FICLONE, src.as_raw_fd()) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EOPNOTSUPP | libc::ENOTTY | libc::ENOSYS | libc::EXDEV | libc::EINVAL) => {
            Ok(false)
        }
        _ => Err(err),
    }
}

#[cfg(target_os = "linux")]
fn try_copy_range(src: &File, dst: &File, len: u64) -> io::Result<bool> {
    let mut remaining = len;
    while remaining > 0 {
        let n = unsafe {
            libc::copy_file_range(
                src.as_raw_fd(),
                std::ptr::null_mut(),
                dst.as_raw_fd(),
                std::ptr::null_mut(),
                remaining as usize,
                0,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                // Nothing copied yet: let the caller fall back cleanly.
                Some(libc::EOPNOTSUPP | libc::ENOSYS | libc::EXDEV | libc::EINVAL)
                    if remaining == len =>
                {
                    Ok(false)
                }
                _ => Err(err),
            };
        }
        if n == 0 {
            break;
        }
        remaining -= n as u64;
    }
    Ok(true)
}

#[cfg(target_os = "linux")]
fn rename_noreplace_impl(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let src_c = CString::new(src.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let dst_c = CString::new(dst.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            src_c.as_ptr(),
            libc::AT_FDCWD,
            dst_c.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Filesystems without RENAME_NOREPLACE support.
        Some(libc::ENOSYS | libc::EINVAL) => rename_noreplace_probe(src, dst),
        _ => Err(err),
    }
}

#[cfg(not(target_os = "linux"))]
fn try_reflink(_src: &File, _dst: &File) -> io::Result<bool> {
    Ok(false)
}

#[cfg(not(target_os = "linux"))]
fn try_copy_range(_src: &File, _dst: &File, _len: u64) -> io::Result<bool> {
    Ok(false)
}

#[cfg(not(target_os = "linux"))]
fn rename_noreplace_impl(src: &Path, dst: &Path) -> io::Result<()> {
    rename_noreplace_probe(src, dst)
}

/// Probe-then-rename. Not atomic against a concurrent create of `dst`;
/// only used where the kernel primitive is unavailable.
#[allow(dead_code)]
fn rename_noreplace_probe(src: &Path, dst: &Path) -> io::Result<()> {
    if dst.symlink_metadata().is_ok() {
        return Err(io::Error::from(io::ErrorKind::AlreadyExists));
    }
    std::fs::rename(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn clone_copies_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"clone me").unwrap();
        clone_file(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"clone me");
        // Source is untouched
        assert_eq!(fs::read(&src).unwrap(), b"clone me");
    }

    #[test]
    fn append_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("dst");
        let src = dir.path().join("src");
        fs::write(&dst, b"hello ").unwrap();
        fs::write(&src, b"world").unwrap();
        let appended = append_contents(&dst, &src).unwrap();
        assert_eq!(appended, 5);
        assert_eq!(fs::read(&dst).unwrap(), b"hello world");
    }

    #[test]
    fn append_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("dst");
        let src = dir.path().join("src");
        fs::write(&dst, b"").unwrap();
        fs::write(&src, b"data").unwrap();
        append_contents(&dst, &src).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"data");
    }

    #[test]
    fn rename_noreplace_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let err = rename_noreplace(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        // Both files intact
        assert_eq!(fs::read(&a).unwrap(), b"a");
        assert_eq!(fs::read(&b).unwrap(), b"b");

        let c = dir.path().join("c");
        rename_noreplace(&a, &c).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&c).unwrap(), b"a");
    }
}
