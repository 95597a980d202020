// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The module host: recipe discovery, compilation (parse + validate),
//! loading into typed `PackageRecord`s, and the source-file lifecycle
//! (`new`/`drop`/`restore`) spec.md §4.4 describes.
//!
//! REDESIGNED per spec.md §9 away from the original's dlopen-of-compiled-
//! `.so` model: grounded end-to-end on the teacher's own recipe format,
//! `crates/stone_recipe` — a YAML document interpreted by a fixed step
//! vocabulary rather than a dynamically loaded object.

use std::path::PathBuf;

use thiserror::Error;

pub mod format;
pub mod host;
pub mod record;
pub mod tombstone;

pub use format::{Invalid, Recipe, Step, UpdatePolicy};
pub use host::{compile, discover, load, CompileReport, RecipeSource, RepoStats, USER_REPO};
pub use record::{PackageRecord, UpdateStatus};
pub use tombstone::{drop_recipe, find_recipe_path, new_recipe, restore_recipe};

#[derive(Debug, Error)]
pub enum Error {
    #[error("read directory {0:?}")]
    ReadDir(PathBuf, #[source] std::io::Error),
    #[error("read recipe file {0:?}")]
    ReadFile(PathBuf, #[source] std::io::Error),
    #[error("write recipe file {0:?}")]
    WriteFile(PathBuf, #[source] std::io::Error),
    #[error("create directory {0:?}")]
    CreateDir(PathBuf, #[source] std::io::Error),
    #[error("rename {0:?} to {1:?}")]
    Rename(PathBuf, PathBuf, #[source] std::io::Error),
    #[error("parse recipe {0:?}")]
    Parse(PathBuf, #[source] serde_yaml::Error),
    #[error("invalid recipe {0:?}")]
    Invalid(PathBuf, #[source] format::Invalid),
    #[error("recipe name {0:?} must be of the form author@package")]
    InvalidName(String),
    #[error("no recipe named {0:?} found in any repository")]
    UnknownRecipe(String),
    #[error("restore target {0:?} already exists")]
    RestoreTargetOccupied(PathBuf),
    #[error("system clock is before the unix epoch")]
    ClockWentBackwards,
    #[error("download steps completed without a git-clone producing a directory")]
    NoDirectoryProduced,
    #[error(transparent)]
    Runner(#[from] runner::Error),
}
