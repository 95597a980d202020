// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Recipe source file lifecycle outside the catalog: locating a recipe
//! across repositories, tombstoning it on `drop`, restoring the most
//! recent tombstone on `restore`, and writing the `new` template.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs_err as fs;

use crate::host::{discover, USER_REPO};
use crate::{format, Error};

/// Find `<repo>/<name>.c` across every repository under `modules_root`.
pub fn find_recipe_path(modules_root: &Path, name: &str) -> Result<Option<PathBuf>, Error> {
    let target = format!("{name}.c");

    Ok(discover(modules_root)?
        .into_iter()
        .find(|source| source.path.file_name().map(|f| f == target.as_str()).unwrap_or(false))
        .map(|source| source.path))
}

/// Rename `<name>.c` to `<name>.c-<unix-timestamp>` in place, leaving a
/// recoverable tombstone. Returns the tombstone path.
pub fn drop_recipe(modules_root: &Path, name: &str) -> Result<PathBuf, Error> {
    let path = find_recipe_path(modules_root, name)?.ok_or_else(|| Error::UnknownRecipe(name.to_string()))?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::ClockWentBackwards)?
        .as_secs();

    let tombstone = path.with_file_name(format!("{name}.c-{timestamp}"));

    fs::rename(&path, &tombstone).map_err(|e| Error::Rename(path, tombstone.clone(), e))?;

    Ok(tombstone)
}

/// Find the most recent tombstone matching `<name>.c-*` across every
/// repository and rename it back to `<name>.c`. Fails if the original path
/// is already occupied.
pub fn restore_recipe(modules_root: &Path, name: &str) -> Result<PathBuf, Error> {
    let prefix = format!("{name}.c-");
    let mut candidates = vec![];

    let Ok(repos) = fs::read_dir(modules_root) else {
        return Err(Error::UnknownRecipe(name.to_string()));
    };

    for repo_entry in repos {
        let repo_entry = repo_entry.map_err(|e| Error::ReadDir(modules_root.to_path_buf(), e))?;
        if !repo_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let repo_path = repo_entry.path();

        for file_entry in fs::read_dir(&repo_path).map_err(|e| Error::ReadDir(repo_path.clone(), e))? {
            let file_entry = file_entry.map_err(|e| Error::ReadDir(repo_path.clone(), e))?;
            let file_name = file_entry.file_name().to_string_lossy().into_owned();

            if let Some(suffix) = file_name.strip_prefix(&prefix) {
                if let Ok(timestamp) = suffix.parse::<u64>() {
                    candidates.push((timestamp, file_entry.path()));
                }
            }
        }
    }

    candidates.sort_by_key(|(timestamp, _)| *timestamp);

    let (_, tombstone) = candidates.into_iter().next_back().ok_or_else(|| Error::UnknownRecipe(name.to_string()))?;

    let restored = tombstone.with_file_name(format!("{name}.c"));

    if restored.exists() {
        return Err(Error::RestoreTargetOccupied(restored));
    }

    fs::rename(&tombstone, &restored).map_err(|e| Error::Rename(tombstone, restored.clone(), e))?;

    Ok(restored)
}

/// Write the recipe template at `<modules_root>/user_modules/<name>.c`.
/// `name` must contain `@` (enforced by `Recipe::validate`, checked here
/// up front to avoid creating an unusable file).
pub fn new_recipe(modules_root: &Path, name: &str) -> Result<PathBuf, Error> {
    if !name.contains('@') {
        return Err(Error::InvalidName(name.to_string()));
    }

    let dir = modules_root.join(USER_REPO);
    fs::create_dir_all(&dir).map_err(|e| Error::CreateDir(dir.clone(), e))?;

    let path = dir.join(format!("{name}.c"));
    let template = format::TEMPLATE.replace("author@package", name);

    fs::write(&path, template).map_err(|e| Error::WriteFile(path.clone(), e))?;

    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_recipe_requires_at_sign() {
        let root = tempfile::tempdir().unwrap();
        assert!(new_recipe(root.path(), "noat").is_err());
    }

    #[test]
    fn drop_then_restore_round_trips() {
        let root = tempfile::tempdir().unwrap();
        new_recipe(root.path(), "me@thing").unwrap();

        let tombstone = drop_recipe(root.path(), "me@thing").unwrap();
        assert!(tombstone.exists());
        assert!(find_recipe_path(root.path(), "me@thing").unwrap().is_none());

        let restored = restore_recipe(root.path(), "me@thing").unwrap();
        assert!(restored.exists());
        assert!(!tombstone.exists());
    }

    #[test]
    fn restore_fails_if_target_occupied() {
        let root = tempfile::tempdir().unwrap();
        new_recipe(root.path(), "me@thing").unwrap();
        let tombstone = drop_recipe(root.path(), "me@thing").unwrap();

        // Something else now occupies the original path.
        new_recipe(root.path(), "me@thing").unwrap();

        let result = restore_recipe(root.path(), "me@thing");
        assert!(matches!(result, Err(Error::RestoreTargetOccupied(_))));
        assert!(tombstone.exists());
    }
}
