// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The recipe file format: a `serde`-deserialized YAML document naming a
//! package and, for each lifecycle hook, a list of steps chosen from a
//! fixed vocabulary. Grounded on `crates/stone_recipe`'s `Recipe`/
//! `from_slice` shape, generalized from its shell/macro-expansion model to
//! the smaller fixed step vocabulary this host interprets directly.

use serde::Deserialize;

pub fn from_slice(bytes: &[u8]) -> Result<Recipe, serde_yaml::Error> {
    serde_yaml::from_slice(bytes)
}

pub fn to_string(recipe: &Recipe) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(recipe)
}

/// One step in the fixed, host-interpreted vocabulary. The vocabulary is
/// extensible only in host code, never in recipes themselves (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub enum Step {
    #[serde(rename = "git-clone")]
    GitClone(String),
    #[serde(rename = "run")]
    Run(String),
    #[serde(rename = "cmake-configure")]
    CmakeConfigure(#[serde(default)] String),
    #[serde(rename = "make")]
    Make(#[serde(default)] String),
}

/// `update: { git: true }` — the only currently supported built-in update
/// policy, matching the original's `forge_pkg_git_update` shortcut (see
/// `original_source/src/forge-headers-src/forge-pkg.c`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct UpdatePolicy {
    #[serde(default)]
    pub git: bool,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    /// The repository this recipe was compiled from. Stamped by
    /// `host::compile_one`, not authored by the recipe itself — a bare
    /// recipe file parsed outside that path (as in these tests) gets the
    /// empty default.
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdatePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_changes: Option<Vec<Step>>,
}

impl Recipe {
    /// `name` must be `author@package`; `version` must be non-empty. These
    /// are the only two fields whose absence makes a recipe structurally
    /// invalid (spec.md §4.4: "missing name/version").
    pub fn validate(&self) -> Result<(), Invalid> {
        if !self.name.contains('@') {
            return Err(Invalid::Name(self.name.clone()));
        }

        if self.version.trim().is_empty() {
            return Err(Invalid::EmptyVersion);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Invalid {
    #[error("recipe name {0:?} must be of the form author@package")]
    Name(String),
    #[error("recipe version must not be empty")]
    EmptyVersion,
}

pub const TEMPLATE: &str = r#"name: author@package
version: "0.0.0"
description: "short description"
website: "https://example.org"
dependencies: []
download:
  - git-clone: "https://example.org/repo.git"
build:
  - run: "./configure --prefix=/usr"
  - run: "make -j$(nproc)"
install:
  - run: "make DESTDIR=$DESTDIR install"
uninstall: []
update:
  git: true
get_changes:
  - run: "git pull"
"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_full_recipe() {
        let recipe = from_slice(TEMPLATE.as_bytes()).unwrap();
        assert_eq!(recipe.name, "author@package");
        assert_eq!(recipe.dependencies, Vec::<String>::new());
        assert_eq!(recipe.download, Some(vec![Step::GitClone("https://example.org/repo.git".into())]));
        assert_eq!(recipe.uninstall, Some(vec![]));
        assert_eq!(recipe.update, Some(UpdatePolicy { git: true }));
        recipe.validate().unwrap();
    }

    #[test]
    fn absent_sections_are_none_not_empty() {
        let recipe = from_slice(b"name: a@b\nversion: \"1.0\"\n").unwrap();
        assert!(recipe.build.is_none());
        assert!(recipe.install.is_none());
    }

    #[test]
    fn name_without_at_is_invalid() {
        let recipe = from_slice(b"name: plainname\nversion: \"1.0\"\n").unwrap();
        assert!(matches!(recipe.validate(), Err(Invalid::Name(_))));
    }

    #[test]
    fn round_trips_through_dump() {
        let recipe = from_slice(TEMPLATE.as_bytes()).unwrap();
        let dumped = to_string(&recipe).unwrap();
        let reparsed = from_slice(dumped.as_bytes()).unwrap();
        assert_eq!(reparsed.name, recipe.name);
        assert_eq!(reparsed.build, recipe.build);
    }
}
