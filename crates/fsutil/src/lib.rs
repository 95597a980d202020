// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Filesystem primitives shared by the fakeroot sandbox and the transaction
//! engine: idempotent directory creation, a recursive copy that preserves
//! mode bits/timestamps/symlinks, a guarded recursive remove, and a
//! best-effort snapshot of the well-known install directories.
//!
//! Generalized from `boulder`'s `util.rs` (`ensure_dir_exists`,
//! `recreate_dir`, `copy_dir`), which copies file contents but not mode bits
//! or timestamps — this crate closes that gap since the spec being
//! implemented requires both to be restored on commit.

use std::collections::BTreeSet;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use fs_err as fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("create directory {0:?}")]
    CreateDir(PathBuf, #[source] std::io::Error),
    #[error("set permissions on {0:?}")]
    SetPermissions(PathBuf, #[source] std::io::Error),
    #[error("read directory {0:?}")]
    ReadDir(PathBuf, #[source] std::io::Error),
    #[error("read metadata for {0:?}")]
    Metadata(PathBuf, #[source] std::io::Error),
    #[error("copy {0:?} to {1:?}")]
    Copy(PathBuf, PathBuf, #[source] std::io::Error),
    #[error("read link {0:?}")]
    ReadLink(PathBuf, #[source] std::io::Error),
    #[error("create symlink {0:?} -> {1:?}")]
    Symlink(PathBuf, PathBuf, #[source] std::io::Error),
    #[error("set mtime on {0:?}")]
    SetMtime(PathBuf, #[source] std::io::Error),
    #[error("remove {0:?}")]
    Remove(PathBuf, #[source] std::io::Error),
    #[error("refusing to remove the filesystem root")]
    RefusedRoot,
    #[error("refusing to operate on path with a null byte: {0:?}")]
    NullByte(PathBuf),
}

/// Create `path` (and any missing parents) with the given mode. A no-op if
/// the directory already exists.
pub fn mkdir_p(path: impl AsRef<Path>, mode: u32) -> Result<(), Error> {
    let path = path.as_ref();

    if path.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| Error::CreateDir(path.to_path_buf(), e))?;

    let permissions = std::fs::Permissions::from_mode(mode);
    fs::set_permissions(path, permissions).map_err(|e| Error::SetPermissions(path.to_path_buf(), e))?;

    Ok(())
}

/// Recursively copy `src` into `dst`, preserving mode bits and modification
/// times on regular files and directories, and re-creating symbolic links
/// by value (never dereferencing them). Entries whose file name matches one
/// of `exclude` (e.g. `.git`) are skipped entirely.
pub fn copy_tree(src: impl AsRef<Path>, dst: impl AsRef<Path>, exclude: &[&str]) -> Result<(), Error> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    let src_meta = fs::symlink_metadata(src).map_err(|e| Error::Metadata(src.to_path_buf(), e))?;

    if src_meta.is_symlink() {
        let target = fs::read_link(src).map_err(|e| Error::ReadLink(src.to_path_buf(), e))?;
        symlink(&target, dst).map_err(|e| Error::Symlink(target, dst.to_path_buf(), e))?;
        return Ok(());
    }

    if src_meta.is_dir() {
        mkdir_p(dst, src_meta.permissions().mode())?;

        let entries = fs::read_dir(src).map_err(|e| Error::ReadDir(src.to_path_buf(), e))?;

        for entry in entries {
            let entry = entry.map_err(|e| Error::ReadDir(src.to_path_buf(), e))?;
            let name = entry.file_name();

            if exclude.iter().any(|e| name == std::ffi::OsStr::new(e)) {
                continue;
            }

            copy_tree(entry.path(), dst.join(&name), exclude)?;
        }

        restore_metadata(dst, &src_meta)?;

        return Ok(());
    }

    fs::copy(src, dst).map_err(|e| Error::Copy(src.to_path_buf(), dst.to_path_buf(), e))?;
    let permissions = std::fs::Permissions::from_mode(src_meta.permissions().mode());
    fs::set_permissions(dst, permissions).map_err(|e| Error::SetPermissions(dst.to_path_buf(), e))?;
    restore_metadata(dst, &src_meta)?;

    Ok(())
}

fn restore_metadata(path: &Path, src_meta: &std::fs::Metadata) -> Result<(), Error> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    filetime::set_file_times(path, atime, mtime).map_err(|e| Error::SetMtime(path.to_path_buf(), e))
}

/// Recursively remove `path`. Refuses to operate on `/` or any path
/// containing a NUL byte (which on Unix is a valid `OsStr` byte but would
/// silently truncate in any C-string-based syscall, a historical class of
/// "rm -rf the whole disk" bug this guards against).
pub fn remove_tree(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();

    if path.as_os_str().as_bytes().contains(&0) {
        return Err(Error::NullByte(path.to_path_buf()));
    }

    let normalized = path.components().as_path();
    if normalized == Path::new("/") {
        return Err(Error::RefusedRoot);
    }

    if !path.exists() && fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    fs::remove_dir_all(path).map_err(|e| Error::Remove(path.to_path_buf(), e))
}

/// Walk each of `dirs`, collecting every regular file and symlink (not
/// directory) found, as absolute paths. Missing roots are skipped silently
/// — most of the well-known install directories won't exist on a fresh
/// root.
pub fn snapshot(dirs: &[PathBuf]) -> BTreeSet<PathBuf> {
    let mut out = BTreeSet::new();

    for dir in dirs {
        walk_into(dir, &mut out);
    }

    out
}

fn walk_into(dir: &Path, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };

        if meta.is_dir() {
            walk_into(&path, out);
        } else {
            out.insert(path);
        }
    }
}

/// The final path component, as a lossy string.
pub fn basename(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The file extension, if any, without the leading dot.
pub fn extension(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref().extension().map(|e| e.to_string_lossy().into_owned())
}

/// Expand a leading `~` or `~/...` against the invoking user's home
/// directory. Paths without a leading `~` are returned unchanged.
pub fn expand_user(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            let rest = rest.strip_prefix('/').unwrap_or(rest);
            return if rest.is_empty() { home } else { home.join(rest) };
        }
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::os::unix::fs::symlink as unix_symlink;

    #[test]
    fn mkdir_p_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c");

        mkdir_p(&target, 0o755).unwrap();
        mkdir_p(&target, 0o755).unwrap();

        assert!(target.is_dir());
    }

    #[test]
    fn copy_tree_preserves_symlinks_and_mode() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("file.txt"), b"hello").unwrap();
        fs::set_permissions(src.path().join("file.txt"), std::fs::Permissions::from_mode(0o741)).unwrap();
        unix_symlink("file.txt", src.path().join("link")).unwrap();

        copy_tree(src.path(), dst.path().join("out"), &[]).unwrap();

        let copied = dst.path().join("out/file.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "hello");
        assert_eq!(fs::metadata(&copied).unwrap().permissions().mode() & 0o777, 0o741);

        let link = dst.path().join("out/link");
        assert!(fs::symlink_metadata(&link).unwrap().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("file.txt"));
    }

    #[test]
    fn copy_tree_excludes_vcs_metadata() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::create_dir(src.path().join(".git")).unwrap();
        fs::write(src.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
        fs::write(src.path().join("Cargo.toml"), b"[package]").unwrap();

        copy_tree(src.path(), dst.path().join("out"), &[".git"]).unwrap();

        assert!(!dst.path().join("out/.git").exists());
        assert!(dst.path().join("out/Cargo.toml").exists());
    }

    #[test]
    fn remove_tree_refuses_root() {
        assert!(matches!(remove_tree("/"), Err(Error::RefusedRoot)));
    }

    #[test]
    fn remove_tree_refuses_null_byte() {
        use std::ffi::OsStr;
        let bytes = b"/tmp/evil\0path";
        let path = OsStr::from_bytes(bytes);
        assert!(matches!(remove_tree(path), Err(Error::NullByte(_))));
    }

    #[test]
    fn snapshot_collects_files_not_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        fs::write(dir.path().join("usr/bin/tool"), b"bin").unwrap();

        let found = snapshot(&[dir.path().to_path_buf()]);
        assert!(found.contains(&dir.path().join("usr/bin/tool")));
        assert!(!found.contains(&dir.path().join("usr/bin")));
    }

    #[test]
    fn expand_user_handles_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_user("~"), home);
        assert_eq!(expand_user("~/foo"), home.join("foo"));
        assert_eq!(expand_user("/abs/path"), PathBuf::from("/abs/path"));
    }
}
