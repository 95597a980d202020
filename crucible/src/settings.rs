// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! On-disk layout (spec.md §6) plus the small admin-overridable config file
//! loaded through `crates/config`'s `Manager`/`Config` trait, matching how
//! `boulder::Env` resolves its directories from defaults layered with a
//! loaded config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const PROGRAM: &str = "crucible";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileConfig {
    state_dir: Option<PathBuf>,
    modules_dir: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    headers_dir: Option<PathBuf>,
}

impl config::Config for FileConfig {
    fn domain() -> String {
        "settings".into()
    }

    fn merge(self, other: Self) -> Self {
        FileConfig {
            state_dir: other.state_dir.or(self.state_dir),
            modules_dir: other.modules_dir.or(self.modules_dir),
            artifacts_dir: other.artifacts_dir.or(self.artifacts_dir),
            cache_dir: other.cache_dir.or(self.cache_dir),
            headers_dir: other.headers_dir.or(self.headers_dir),
        }
    }
}

/// Resolved filesystem layout for one run, anchored at `root` (the live
/// install root; `/` unless overridden for testing).
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub headers_dir: PathBuf,
}

impl Settings {
    pub fn load(root: impl Into<PathBuf>) -> Self {
        let root = root.into();

        let file: FileConfig = config::Manager::system(&root, PROGRAM).load().unwrap_or_default();

        Settings {
            state_dir: file.state_dir.unwrap_or_else(|| root.join("var/lib/crucible")),
            modules_dir: file.modules_dir.unwrap_or_else(|| root.join("var/lib/crucible/modules")),
            artifacts_dir: file.artifacts_dir.unwrap_or_else(|| root.join("var/lib/crucible/artifacts")),
            cache_dir: file.cache_dir.unwrap_or_else(|| root.join("var/cache/crucible")),
            headers_dir: file.headers_dir.unwrap_or_else(|| root.join("etc/crucible")),
            root,
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog")
    }

    pub fn conf_header_path(&self) -> PathBuf {
        self.headers_dir.join("conf.h")
    }

    /// Well-known install directories scanned for `fsutil::snapshot`
    /// (spec.md §6), anchored under `root`.
    pub fn well_known_install_dirs(&self) -> Vec<PathBuf> {
        [
            "usr/bin",
            "usr/include",
            "usr/lib",
            "usr/lib64",
            "usr/share",
            "usr/local/bin",
            "usr/local/include",
            "usr/local/lib",
            "usr/local/lib64",
            "usr/local/sbin",
            "usr/local/share",
            "etc",
        ]
        .iter()
        .map(|rel| self.root.join(rel))
        .collect()
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.state_dir, &self.modules_dir, &self.artifacts_dir, &self.cache_dir, &self.headers_dir] {
            fs_err::create_dir_all(dir)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_without_a_config_file_falls_back_to_defaults() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());

        assert_eq!(settings.state_dir, root.path().join("var/lib/crucible"));
        assert_eq!(settings.modules_dir, root.path().join("var/lib/crucible/modules"));
        assert_eq!(settings.artifacts_dir, root.path().join("var/lib/crucible/artifacts"));
        assert_eq!(settings.cache_dir, root.path().join("var/cache/crucible"));
        assert_eq!(settings.headers_dir, root.path().join("etc/crucible"));
    }

    #[test]
    fn well_known_install_dirs_are_anchored_under_root() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());

        let dirs = settings.well_known_install_dirs();

        assert!(dirs.contains(&root.path().join("usr/bin")));
        assert!(dirs.contains(&root.path().join("etc")));
        assert!(dirs.iter().all(|dir| dir.starts_with(root.path())));
    }

    #[test]
    fn ensure_directories_creates_every_resolved_directory() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());

        settings.ensure_directories().unwrap();

        assert!(settings.state_dir.is_dir());
        assert!(settings.modules_dir.is_dir());
        assert!(settings.artifacts_dir.is_dir());
        assert!(settings.cache_dir.is_dir());
        assert!(settings.headers_dir.is_dir());
    }
}

