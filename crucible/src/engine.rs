// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The transaction engine: dependency resolution, source acquisition,
//! fakeroot staging, build/install execution, and file-granular commit with
//! rollback. Grounded on `moss::db::layout`'s install pipeline — register,
//! stage, walk, commit-with-rollback, finalize — rebuilt around a fakeroot
//! staging directory and a catalog row instead of a `.stone` archive.

use std::collections::HashMap;
use std::fs::Permissions;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::settings::Settings;
use crate::error::Error;

/// Everything the engine needs for one invocation: where things live, which
/// recipes are loaded, and the run's flags.
pub struct Engine<'a> {
    pub settings: &'a Settings,
    pub catalog: &'a catalog::Catalog,
    pub records: &'a HashMap<String, recipe::PackageRecord>,
    pub keep_fakeroot: bool,
    pub pretend: bool,
    /// Skip dependency closure: install/uninstall only the named packages.
    pub only: bool,
}

impl<'a> Engine<'a> {
    /// Install every name in `targets`, in the order given. Dependencies are
    /// pulled in recursively and are not reordered against the targets
    /// themselves — the dependency graph is used only to reject cycles
    /// before any catalog mutation happens.
    pub fn install_targets(&self, targets: &[String]) -> Result<(), Error> {
        self.validate_acyclic()?;

        for name in targets {
            self.install_one(name, false)?;
        }

        Ok(())
    }

    fn validate_acyclic(&self) -> Result<(), Error> {
        let mut graph = dag::Dag::new();

        for record in self.records.values() {
            let from = graph.add_node_or_get_index(record.name().to_string());

            for dep in record.dependencies() {
                let to = graph.add_node_or_get_index(dep.clone());
                graph.add_edge(from, to);
            }
        }

        graph.order()?;

        Ok(())
    }

    fn install_one(&self, name: &str, is_dep: bool) -> Result<(), Error> {
        if is_dep {
            if let Some(true) = self.catalog.is_installed(name)? {
                return Ok(());
            }
        }

        let record = self.records.get(name).ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

        if self.pretend {
            log::info!("would install {name} {}", record.version());

            if !self.only {
                for dep in record.dependencies() {
                    self.install_one(dep, true)?;
                }
            }

            return Ok(());
        }

        let package_id = self.catalog.register(
            name,
            record.version(),
            record.description(),
            record.website(),
            record.dependencies(),
            !is_dep,
            Some(record.repository()),
        )?;

        if !self.only {
            for dep in record.dependencies() {
                self.install_one(dep, true)?;
            }
        }

        let source_dir = self.resolve_source(name, record)?;

        let mut fakeroot = fakeroot::Fakeroot::new(name)?;
        if self.keep_fakeroot {
            fakeroot.keep();
        }

        let buildsrc = fakeroot.path().join("buildsrc");
        fsutil::copy_tree(&source_dir, &buildsrc, &[".git", ".hg", ".svn"])?;

        if let Some(result) = record.build() {
            in_dir(&buildsrc, || result.map_err(Error::from))?;
        }

        if let Some(result) = record.install() {
            in_dir(&buildsrc, || result.map_err(Error::from))?;
        } else {
            log::warn!("package {name:?} has no install() section; nothing will be committed");
        }

        let manifest = walk_manifest(fakeroot.path())?;
        if manifest.is_empty() {
            log::warn!("{}", Error::NoInstallOutput(name.to_string()));
        }

        let already_present = fsutil::snapshot(&self.settings.well_known_install_dirs());

        let mut committed = vec![];
        let mut entries = vec![];

        for rel in &manifest {
            let src = fakeroot.path().join(rel);
            let dst = self.settings.root.join(rel);

            let meta = fs::symlink_metadata(&src)?;

            if !meta.is_file() && !meta.is_symlink() {
                log::warn!("{}", Error::UnsupportedFileKind(rel.clone()));
                continue;
            }

            if already_present.contains(&dst) {
                log::warn!("{dst:?} is already owned by another install; overwriting");
            }

            match commit_one(&src, &dst, &meta) {
                Ok(entry) => {
                    committed.push(dst);
                    entries.push(entry);
                }
                Err(err) => {
                    rollback(&committed);
                    return Err(err);
                }
            }
        }

        self.catalog.record_files(package_id, &entries)?;
        self.catalog.mark_installed(name, &source_dir.to_string_lossy())?;

        fakeroot.destroy()?;

        Ok(())
    }

    /// Reuse the cached source tree recorded in the catalog if it still
    /// exists on disk, otherwise run the recipe's `download()` from within
    /// the package-source cache.
    fn resolve_source(&self, name: &str, record: &recipe::PackageRecord) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.settings.cache_dir)?;

        if let Some(package) = self.catalog.package(name)? {
            if let Some(location) = package.source_location {
                let cached = PathBuf::from(location);
                if cached.is_dir() {
                    return Ok(cached);
                }
            }
        }

        let cache_dir = self.settings.cache_dir.clone();
        let dir_name = in_dir(&cache_dir, || {
            record
                .download()
                .ok_or_else(|| Error::NoSource(name.to_string()))?
                .map_err(Error::from)
        })?;

        Ok(cache_dir.join(dir_name))
    }

    /// Run `uninstall()` if the recipe is still loaded, unlink every file the
    /// catalog has on record for the package, then drop its rows.
    pub fn uninstall(&self, name: &str, remove_source: bool) -> Result<(), Error> {
        let package = self.catalog.package(name)?.ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

        if let Some(record) = self.records.get(name) {
            if let Some(result) = record.uninstall() {
                result?;
            }
        }

        for path in self.catalog.files_of(package.id)? {
            if let Err(err) = fs::remove_file(&path) {
                log::warn!("uninstall {name:?}: failed to remove {path:?}: {err}");
            }
        }

        self.catalog.clear_files(package.id)?;
        self.catalog.mark_uninstalled(name, !remove_source)?;

        if remove_source {
            if let Some(location) = package.source_location {
                fsutil::remove_tree(&location)?;
            }
        }

        Ok(())
    }

    /// Report whether `name` needs rebuilding, without touching the cached
    /// source. Recipes without an `update()` section have no way to report
    /// their own freshness, so a rebuild is always requested for them.
    pub fn update_status(&self, name: &str) -> Result<recipe::UpdateStatus, Error> {
        let record = self.records.get(name).ok_or_else(|| Error::UnknownPackage(name.to_string()))?;
        let package = self.catalog.package(name)?.ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

        if let Some(location) = &package.source_location {
            if let Some(result) = record.update(Path::new(location)) {
                return Ok(result?);
            }
        }

        Ok(recipe::UpdateStatus::RebuildNeeded)
    }

    /// Bring `name`'s cached source up to date ahead of a rebuild. Tries
    /// `get_changes()` first (an in-place refresh, e.g. `git pull`); if that
    /// capability is absent or fails, the cached source tree is discarded so
    /// the next `install_targets` call re-downloads from scratch — unless
    /// `keep_cache` asks to leave a failed or absent refresh alone.
    pub fn refresh_source(&self, name: &str, keep_cache: bool) -> Result<(), Error> {
        let record = self.records.get(name).ok_or_else(|| Error::UnknownPackage(name.to_string()))?;
        let package = self.catalog.package(name)?.ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

        match record.get_changes() {
            Some(Ok(())) => return Ok(()),
            Some(Err(err)) => log::warn!("get_changes() failed for {name:?}: {err}"),
            None => log::warn!("package {name:?} has no get_changes() capability"),
        }

        if keep_cache {
            log::info!("--keep-cache set; leaving {name:?}'s cached source in place");
            return Ok(());
        }

        if let Some(location) = &package.source_location {
            fsutil::remove_tree(location)?;
        }

        Ok(())
    }

    /// Packages installed only as a dependency that nothing installed
    /// depends on anymore.
    pub fn orphans(&self) -> Result<Vec<String>, Error> {
        let mut names = vec![];

        for package in self.catalog.all_packages()? {
            if !package.installed || package.is_explicit {
                continue;
            }

            if self.catalog.dependents_of(&package.name)?.is_empty() {
                names.push(package.name);
            }
        }

        Ok(names)
    }
}

fn in_dir<T>(dir: &Path, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    let previous = std::env::current_dir()?;
    std::env::set_current_dir(dir)?;

    let result = f();
    let restore = std::env::set_current_dir(&previous);

    match (result, restore) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(Error::Io(err)),
        (Err(err), _) => Err(err),
    }
}

/// Every regular file and symlink under `root`, relative to it, in
/// deterministic (sorted, depth-first) order. The `buildsrc` subtree is
/// never part of the install manifest.
fn walk_manifest(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut out = vec![];
    walk_manifest_rec(root, root, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk_manifest_rec(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let rel = path.strip_prefix(root).expect("walked path is under its own root").to_path_buf();

        if rel.components().next().map(|c| c.as_os_str() == "buildsrc").unwrap_or(false) {
            continue;
        }

        let meta = fs::symlink_metadata(&path)?;

        if meta.is_dir() {
            walk_manifest_rec(root, &path, out)?;
        } else {
            out.push(rel);
        }
    }

    Ok(())
}

fn commit_one(src: &Path, dst: &Path, meta: &std::fs::Metadata) -> Result<catalog::FileEntry, Error> {
    if let Some(parent) = dst.parent() {
        fsutil::mkdir_p(parent, 0o755)?;
    }

    let mtime = filetime::FileTime::from_last_modification_time(meta);

    if meta.is_symlink() {
        let target = fs::read_link(src)?;

        if fs::symlink_metadata(dst).is_ok() {
            fs::remove_file(dst)?;
        }

        symlink(&target, dst)?;

        return Ok(catalog::FileEntry {
            absolute_path: dst.to_string_lossy().into_owned(),
            size: 0,
            mode: 0o777,
            mtime: mtime.unix_seconds(),
        });
    }

    let mut reader = fs::File::open(src)?;
    let mut writer = fs::File::create(dst)?;
    let size = std::io::copy(&mut reader, &mut writer)?;

    let mode = meta.permissions().mode() & 0o7777;
    fs::set_permissions(dst, Permissions::from_mode(mode))?;
    filetime::set_file_times(dst, mtime, mtime)?;

    Ok(catalog::FileEntry {
        absolute_path: dst.to_string_lossy().into_owned(),
        size,
        mode,
        mtime: mtime.unix_seconds(),
    })
}

fn rollback(committed: &[PathBuf]) {
    for path in committed.iter().rev() {
        if let Err(err) = fs::remove_file(path) {
            log::warn!("rollback: failed to remove {path:?}: {err}");
        }
    }
}
