// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Recipe-repository management (`add-repo`, `drop-repo`) and explicit-flag
//! promotion (`save-dep`).

use fs_err as fs;
use thiserror::Error;

use crate::engine::Engine;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog")]
    Catalog(#[from] catalog::Error),
    #[error("runner")]
    Runner(#[from] runner::Error),
    #[error("filesystem utility")]
    Fsutil(#[from] fsutil::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unknown package {0:?}")]
    UnknownPackage(String),
    #[error("refusing to drop repository {0:?} without --force")]
    ConfirmationRequired(String),
    #[error("transaction")]
    Engine(#[from] crate::error::Error),
}

/// `git pull` every repository directory under `modules_dir` that has a
/// `.git` directory of its own.
pub fn sync(settings: &Settings) -> Result<(), Error> {
    let Ok(entries) = fs::read_dir(&settings.modules_dir) else {
        return Ok(());
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.is_dir() || !path.join(".git").is_dir() {
            continue;
        }

        log::info!("syncing repository {:?}", path.file_name().unwrap_or_default());
        runner::with_dir(&path, || runner::execute("git pull --ff-only"))?;
    }

    Ok(())
}

pub fn add(settings: &Settings, url: &str) -> Result<(), Error> {
    fs::create_dir_all(&settings.modules_dir)?;

    let name = repo_name(url);
    let destination = settings.modules_dir.join(&name);

    runner::with_dir(&settings.modules_dir, || {
        runner::execute(&format!("git clone {url} {name}"))
    })?;

    println!("cloned {url} into {}", destination.display());

    Ok(())
}

/// Remove a repository and every package it owns. Uninstalling runs before
/// the directory is removed, since `uninstall`'s `uninstall()` step (if the
/// recipe has one) may still need the loaded record to run.
pub fn drop(engine: &Engine<'_>, settings: &Settings, name: &str, force: bool) -> Result<(), Error> {
    if !force {
        return Err(Error::ConfirmationRequired(name.to_string()));
    }

    for package in engine.catalog.packages_in_repository(name)? {
        if package.installed {
            log::info!("uninstalling {} (owned by repository {name:?})", package.name);
            engine.uninstall(&package.name, true)?;
        } else {
            engine.catalog.delete_package(&package.name)?;
        }
    }

    fsutil::remove_tree(settings.modules_dir.join(name))?;
    println!("dropped repository {name}");

    Ok(())
}

/// Promote an implicit install to explicit without disturbing its recorded
/// dependency edges (`register` only ever adds edges, never removes them).
pub fn save_dep(catalog: &catalog::Catalog, name: &str) -> Result<(), Error> {
    let package = catalog.package(name)?.ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

    catalog.register(name, &package.version, &package.description, package.website.as_deref(), &[], true, None)?;

    println!("{name} is now explicit");

    Ok(())
}

fn repo_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repo_name_strips_git_suffix_and_trailing_slash() {
        assert_eq!(repo_name("https://example.org/packages.git"), "packages");
        assert_eq!(repo_name("https://example.org/packages"), "packages");
        assert_eq!(repo_name("https://example.org/packages.git/"), "packages");
    }

    #[test]
    fn drop_without_force_asks_for_confirmation() {
        use std::collections::HashMap;

        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());
        settings.ensure_directories().unwrap();
        let catalog = catalog::Catalog::new(":memory:").unwrap();
        let records = HashMap::new();
        let engine = Engine {
            settings: &settings,
            catalog: &catalog,
            records: &records,
            keep_fakeroot: false,
            pretend: false,
            only: false,
        };

        let err = drop(&engine, &settings, "somepackage", false).unwrap_err();

        assert!(matches!(err, Error::ConfirmationRequired(name) if name == "somepackage"));
    }

    #[test]
    fn drop_uninstalls_every_package_the_repository_owns() {
        use std::collections::HashMap;

        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());
        settings.ensure_directories().unwrap();
        fs::create_dir_all(settings.modules_dir.join("extra")).unwrap();

        let catalog = catalog::Catalog::new(":memory:").unwrap();
        catalog.register("a@pkg", "1.0", "desc", None, &[], true, Some("extra")).unwrap();
        catalog.register("a@other", "1.0", "desc", None, &[], true, Some("core")).unwrap();
        catalog.mark_installed("a@pkg", "/cache/a@pkg").unwrap();
        catalog.mark_installed("a@other", "/cache/a@other").unwrap();

        let records = HashMap::new();
        let engine = Engine {
            settings: &settings,
            catalog: &catalog,
            records: &records,
            keep_fakeroot: false,
            pretend: false,
            only: false,
        };

        drop(&engine, &settings, "extra", true).unwrap();

        assert_eq!(catalog.is_installed("a@pkg").unwrap(), Some(false));
        assert_eq!(catalog.is_installed("a@other").unwrap(), Some(true));
        assert!(!settings.modules_dir.join("extra").exists());
    }
}
