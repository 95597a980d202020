// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Recipe discovery, "compilation" (parse + validate), and loading. The
//! original dynamically loads a compiled `.so` per recipe; the REDESIGN
//! documented in the expanded spec replaces that with data-plus-interpreter,
//! so "compiling" here means parsing and validating every recipe file and
//! depositing a normalized copy in the artifact directory — still a
//! meaningful on-disk artifact, just not a linked object.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::format;
use crate::record::PackageRecord;
use crate::Error;

pub const USER_REPO: &str = "user_modules";
const RECIPE_EXTENSION: &str = "c";
const ARTIFACT_EXTENSION: &str = "cache";

/// A recipe source file found under a repository.
#[derive(Debug, Clone)]
pub struct RecipeSource {
    pub repository: String,
    pub path: PathBuf,
}

/// Enumerate every `<name>.c` file at the top level of every repository
/// (one subdirectory of `modules_root` per repository).
pub fn discover(modules_root: &Path) -> Result<Vec<RecipeSource>, Error> {
    let mut sources = vec![];

    let Ok(repos) = fs::read_dir(modules_root) else {
        return Ok(sources);
    };

    for repo_entry in repos {
        let repo_entry = repo_entry.map_err(|e| Error::ReadDir(modules_root.to_path_buf(), e))?;

        if !repo_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let repo_path = repo_entry.path();
        let repository = repo_entry.file_name().to_string_lossy().into_owned();

        for file_entry in fs::read_dir(&repo_path).map_err(|e| Error::ReadDir(repo_path.clone(), e))? {
            let file_entry = file_entry.map_err(|e| Error::ReadDir(repo_path.clone(), e))?;
            let path = file_entry.path();

            if path.extension().and_then(|e| e.to_str()) == Some(RECIPE_EXTENSION) {
                sources.push(RecipeSource {
                    repository: repository.clone(),
                    path,
                });
            }
        }
    }

    Ok(sources)
}

/// Pass/fail counts for one repository's recipes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStats {
    pub compiled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub per_repository: BTreeMap<String, RepoStats>,
}

/// Parse and validate every recipe under `modules_root`, depositing a
/// normalized YAML copy of each valid one under `artifacts_dir` as
/// `<name>.cache`. A parse/validation failure is logged and counted against
/// its repository without aborting the sweep.
pub fn compile(modules_root: &Path, artifacts_dir: &Path) -> Result<CompileReport, Error> {
    fs::create_dir_all(artifacts_dir).map_err(|e| Error::CreateDir(artifacts_dir.to_path_buf(), e))?;

    let mut report = CompileReport::default();

    for source in discover(modules_root)? {
        let stats = report.per_repository.entry(source.repository.clone()).or_default();

        match compile_one(&source.path, &source.repository, artifacts_dir) {
            Ok(()) => stats.compiled += 1,
            Err(err) => {
                log::warn!("failed to compile recipe {:?}: {err}", source.path);
                stats.failed += 1;
            }
        }
    }

    Ok(report)
}

fn compile_one(path: &Path, repository: &str, artifacts_dir: &Path) -> Result<(), Error> {
    let bytes = fs::read(path).map_err(|e| Error::ReadFile(path.to_path_buf(), e))?;
    let mut recipe = format::from_slice(&bytes).map_err(|e| Error::Parse(path.to_path_buf(), e))?;
    recipe.validate().map_err(|e| Error::Invalid(path.to_path_buf(), e))?;
    recipe.repository = repository.to_string();

    let artifact_path = artifacts_dir.join(format!("{}.{ARTIFACT_EXTENSION}", recipe.name));
    let normalized = format::to_string(&recipe).map_err(|e| Error::Parse(path.to_path_buf(), e))?;

    fs::write(&artifact_path, normalized).map_err(|e| Error::WriteFile(artifact_path, e))?;

    Ok(())
}

/// Open every artifact under `artifacts_dir` and materialize a
/// `PackageRecord`. Artifacts that fail to parse are skipped with a
/// diagnostic, matching "artifacts whose load fails are skipped."
pub fn load(artifacts_dir: &Path) -> Result<Vec<PackageRecord>, Error> {
    let mut records = vec![];

    let Ok(entries) = fs::read_dir(artifacts_dir) else {
        return Ok(records);
    };

    for entry in entries {
        let entry = entry.map_err(|e| Error::ReadDir(artifacts_dir.to_path_buf(), e))?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
            continue;
        }

        match fs::read(&path).map_err(|e| Error::ReadFile(path.clone(), e)).and_then(|bytes| {
            format::from_slice(&bytes).map_err(|e| Error::Parse(path.clone(), e))
        }) {
            Ok(recipe) => records.push(PackageRecord::from(recipe)),
            Err(err) => log::warn!("skipping unloadable artifact {path:?}: {err}"),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_recipe(repo_dir: &Path, name_file: &str, contents: &str) {
        fs::create_dir_all(repo_dir).unwrap();
        fs::write(repo_dir.join(name_file), contents).unwrap();
    }

    #[test]
    fn discover_finds_recipes_per_repository() {
        let root = tempfile::tempdir().unwrap();
        write_recipe(&root.path().join("core"), "a.c", crate::format::TEMPLATE);
        write_recipe(&root.path().join(USER_REPO), "b.c", crate::format::TEMPLATE);

        let mut found = discover(root.path()).unwrap();
        found.sort_by(|a, b| a.repository.cmp(&b.repository));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].repository, "core");
        assert_eq!(found[1].repository, USER_REPO);
    }

    #[test]
    fn compile_reports_pass_and_fail_per_repo() {
        let root = tempfile::tempdir().unwrap();
        write_recipe(&root.path().join("core"), "a.c", crate::format::TEMPLATE);
        write_recipe(&root.path().join("core"), "bad.c", "not: valid: yaml: [");

        let artifacts = tempfile::tempdir().unwrap();
        let report = compile(root.path(), artifacts.path()).unwrap();

        let stats = report.per_repository.get("core").unwrap();
        assert_eq!(stats.compiled, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn compiled_artifact_carries_its_repository() {
        let root = tempfile::tempdir().unwrap();
        write_recipe(&root.path().join("core"), "a.c", crate::format::TEMPLATE);

        let artifacts = tempfile::tempdir().unwrap();
        compile(root.path(), artifacts.path()).unwrap();

        let records = load(artifacts.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].repository(), "core");
    }

    #[test]
    fn load_skips_unparseable_artifacts() {
        let artifacts = tempfile::tempdir().unwrap();
        fs::write(artifacts.path().join("good.cache"), crate::format::TEMPLATE).unwrap();
        fs::write(artifacts.path().join("bad.cache"), "not: valid: [").unwrap();

        let records = load(artifacts.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "author@package");
    }
}
