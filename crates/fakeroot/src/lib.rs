// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Fakeroot staging sandbox for a single install transaction.
//!
//! Unlike the namespace-based container this crate used to wrap, a fakeroot
//! here is nothing more than a scratch directory tree plus the `DESTDIR`
//! environment-variable convention: the recipe's `install()` step is expected
//! to write under `DESTDIR` instead of the live root, and the transaction
//! engine commits those files into the live root itself afterward.

use std::env;
use std::path::{Path, PathBuf};

use fs_err as fs;
use thiserror::Error;

/// Root-level directories populated into every fresh fakeroot, mirroring the
/// common Unix top-level layout a recipe's `install()` expects to find.
const SKELETON: &[&str] = &[
    "bin",
    "etc",
    "lib",
    "usr",
    "usr/bin",
    "usr/lib",
    "usr/local",
    "var",
    "tmp",
];

#[derive(Debug, Error)]
pub enum Error {
    #[error("create fakeroot directory {0:?}")]
    Create(PathBuf, #[source] std::io::Error),
    #[error("remove fakeroot directory {0:?}")]
    Remove(PathBuf, #[source] std::io::Error),
    #[error("create fakeroot temp directory")]
    Template(#[source] std::io::Error),
}

/// A staging tree for one install transaction.
///
/// Created with [`Fakeroot::new`], which also exports `DESTDIR` for the
/// duration of the value's lifetime. Dropping it removes the tree and
/// unsets `DESTDIR`, unless [`Fakeroot::keep`] was called.
pub struct Fakeroot {
    root: PathBuf,
    keep: bool,
}

impl Fakeroot {
    /// Create a new staging tree under the system temp root, named after
    /// `package` for easy identification (`pkg-<name>-XXXXXX`), and export
    /// its path via `DESTDIR`.
    pub fn new(package: &str) -> Result<Self, Error> {
        let root = tempfile::Builder::new()
            .prefix(&format!("pkg-{package}-"))
            .tempdir()
            .map_err(Error::Template)?
            // We manage removal ourselves on an explicit create/destroy
            // lifecycle rather than tying it to a TempDir's own drop glue.
            .keep();

        for dir in SKELETON {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| Error::Create(path, e))?;
        }

        env::set_var("DESTDIR", &root);

        Ok(Self { root, keep: false })
    }

    /// Absolute path of the staging tree's root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Retain the staging tree on drop instead of removing it (`--keep-fakeroot`).
    pub fn keep(&mut self) {
        self.keep = true;
    }

    fn teardown(&mut self) -> Result<(), Error> {
        env::remove_var("DESTDIR");

        if self.keep {
            return Ok(());
        }

        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| Error::Remove(self.root.clone(), e))?;
        }

        Ok(())
    }

    /// Explicitly tear down the sandbox, observing any removal error. Runs
    /// automatically (ignoring the error) on drop if not called already.
    pub fn destroy(mut self) -> Result<(), Error> {
        let result = self.teardown();
        // The Drop impl would otherwise attempt (and silently swallow) the
        // same teardown a second time.
        std::mem::forget(self);
        result
    }
}

impl Drop for Fakeroot {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    // DESTDIR is process-global; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn skeleton_is_populated() {
        let _guard = ENV_LOCK.lock().unwrap();
        let fakeroot = Fakeroot::new("test-pkg").unwrap();

        for dir in SKELETON {
            assert!(fakeroot.path().join(dir).is_dir());
        }

        assert_eq!(env::var("DESTDIR").unwrap(), fakeroot.path().to_str().unwrap());
    }

    #[test]
    fn destroy_removes_tree_and_unsets_destdir() {
        let _guard = ENV_LOCK.lock().unwrap();
        let fakeroot = Fakeroot::new("test-pkg2").unwrap();
        let path = fakeroot.path().to_path_buf();

        fakeroot.destroy().unwrap();

        assert!(!path.exists());
        assert!(env::var("DESTDIR").is_err());
    }

    #[test]
    fn keep_retains_tree() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut fakeroot = Fakeroot::new("test-pkg3").unwrap();
        fakeroot.keep();
        let path = fakeroot.path().to_path_buf();

        drop(fakeroot);

        assert!(path.exists());
        fs::remove_dir_all(&path).unwrap();
    }
}
