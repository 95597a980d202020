// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! `PackageRecord`: the typed, in-memory capability set a loaded recipe
//! exposes to the transaction engine, plus the fixed step interpreter that
//! executes a recipe's lifecycle hooks through `crates/runner`.

use std::path::Path;

use crate::format::{Recipe, Step, UpdatePolicy};
use crate::Error;

/// The capability set described by spec.md §3: each lifecycle hook is
/// present iff the recipe defined the corresponding section.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    recipe: Recipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    RebuildNeeded,
}

impl From<Recipe> for PackageRecord {
    fn from(recipe: Recipe) -> Self {
        PackageRecord { recipe }
    }
}

impl PackageRecord {
    pub fn name(&self) -> &str {
        &self.recipe.name
    }

    pub fn version(&self) -> &str {
        &self.recipe.version
    }

    pub fn description(&self) -> &str {
        &self.recipe.description
    }

    pub fn website(&self) -> Option<&str> {
        self.recipe.website.as_deref()
    }

    /// The repository this recipe was compiled from. Empty for a record
    /// built directly from a `Recipe` that never went through `host::compile`.
    pub fn repository(&self) -> &str {
        &self.recipe.repository
    }

    pub fn dependencies(&self) -> &[String] {
        &self.recipe.dependencies
    }

    pub fn has_build(&self) -> bool {
        self.recipe.build.is_some()
    }

    pub fn has_install(&self) -> bool {
        self.recipe.install.is_some()
    }

    pub fn has_uninstall(&self) -> bool {
        self.recipe.uninstall.is_some()
    }

    pub fn has_update(&self) -> bool {
        self.recipe.update.is_some()
    }

    pub fn has_get_changes(&self) -> bool {
        self.recipe.get_changes.is_some()
    }

    /// Run the `download` steps and return the directory name the last
    /// `git-clone` step produced. `None` if the recipe has no `download`
    /// section.
    pub fn download(&self) -> Option<Result<String, Error>> {
        let steps = self.recipe.download.as_ref()?;

        Some(run_download(steps))
    }

    pub fn build(&self) -> Option<Result<(), Error>> {
        self.recipe.build.as_ref().map(|steps| run_steps(steps))
    }

    pub fn install(&self) -> Option<Result<(), Error>> {
        self.recipe.install.as_ref().map(|steps| run_steps(steps))
    }

    pub fn uninstall(&self) -> Option<Result<(), Error>> {
        self.recipe.uninstall.as_ref().map(|steps| run_steps(steps))
    }

    pub fn get_changes(&self) -> Option<Result<(), Error>> {
        self.recipe.get_changes.as_ref().map(|steps| run_steps(steps))
    }

    /// Evaluate `update()` from within `source_dir` (the unpacked source
    /// tree). Only the `{git: true}` built-in is currently supported.
    pub fn update(&self, source_dir: &Path) -> Option<Result<UpdateStatus, Error>> {
        let policy = self.recipe.update.as_ref()?;

        Some(evaluate_update(policy, source_dir))
    }
}

fn run_steps(steps: &[Step]) -> Result<(), Error> {
    for step in steps {
        execute_step(step)?;
    }

    Ok(())
}

fn run_download(steps: &[Step]) -> Result<String, Error> {
    let mut produced = None;

    for step in steps {
        if let Step::GitClone(url) = step {
            let dir = clone_dir_name(url);
            runner::execute(&format!("git clone {url} {dir}"))?;
            produced = Some(dir);
        } else {
            execute_step(step)?;
        }
    }

    produced.ok_or(Error::NoDirectoryProduced)
}

fn execute_step(step: &Step) -> Result<(), Error> {
    match step {
        Step::GitClone(url) => {
            let dir = clone_dir_name(url);
            runner::execute(&format!("git clone {url} {dir}"))?;
        }
        Step::Run(command) => runner::execute(command)?,
        Step::CmakeConfigure(flags) => runner::execute(&format!("cmake -S . -B build {flags}"))?,
        Step::Make(targets) => runner::execute(&format!("make {targets}"))?,
    }

    Ok(())
}

fn clone_dir_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

/// The original's `forge_pkg_git_update` built-in: compare the checked-out
/// HEAD against the upstream tracking branch.
fn evaluate_update(policy: &UpdatePolicy, source_dir: &Path) -> Result<UpdateStatus, Error> {
    if !policy.git {
        return Ok(UpdateStatus::UpToDate);
    }

    runner::with_dir(source_dir, || {
        let head = runner::capture_output("git rev-parse HEAD")?;
        let upstream = runner::capture_output("git rev-parse @{u}")?;

        Ok(if head == upstream {
            UpdateStatus::UpToDate
        } else {
            UpdateStatus::RebuildNeeded
        })
    })
    .map_err(Error::from)
}
