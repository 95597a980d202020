// SPDX-FileCopyrightText: Copyright © 2020-2023 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Layered YAML configuration: vendor defaults under `/usr/share`, admin
//! overrides under `/etc`, and an optional per-user scope under the user's
//! config directory. `Manager::load` reads every applicable file and `.d`
//! directory and lets the config type decide how to merge them.
//!
//! The transaction engine is entirely synchronous, so this crate reads
//! files with `std::fs` rather than the original async `tokio`/`futures`
//! combination — the search/merge shape is otherwise unchanged.

use std::fmt;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const EXTENSION: &str = "yaml";

pub trait Config: DeserializeOwned {
    fn domain() -> String;

    fn merge(self, other: Self) -> Self;
}

#[derive(Debug, Clone)]
pub struct Manager {
    program: String,
    scope: Scope,
}

impl Manager {
    pub fn system(root: impl Into<PathBuf>, program: impl ToString) -> Self {
        Self {
            program: program.to_string(),
            scope: Scope::System(root.into()),
        }
    }

    pub fn user(program: impl ToString) -> Option<Self> {
        Some(Self {
            program: program.to_string(),
            scope: Scope::User(dirs::config_dir()?),
        })
    }

    /// Read every applicable config file/directory for `T`, in priority
    /// order (vendor base, vendor `.d`, admin base, admin `.d` for a system
    /// scope; just the user directory for a user scope), and fold them
    /// together with `Config::merge`. Later entries win.
    pub fn load<T: Config>(&self) -> Option<T> {
        let domain = T::domain();

        let searches: Vec<(Entry, Search)> = match &self.scope {
            Scope::System(root) => vec![
                (
                    Entry::File,
                    Search::System {
                        root: root.clone(),
                        base: Base::Vendor,
                    },
                ),
                (
                    Entry::Directory,
                    Search::System {
                        root: root.clone(),
                        base: Base::Vendor,
                    },
                ),
                (
                    Entry::File,
                    Search::System {
                        root: root.clone(),
                        base: Base::Admin,
                    },
                ),
                (
                    Entry::Directory,
                    Search::System {
                        root: root.clone(),
                        base: Base::Admin,
                    },
                ),
            ],
            Scope::User(root) => vec![(Entry::Directory, Search::Home(root.clone()))],
        };

        let mut configs = vec![];

        for (entry, search) in searches {
            for path in enumerate_paths(entry, &search, &self.program, &domain) {
                if let Some(config) = read_config(&path) {
                    configs.push(config);
                }
            }
        }

        configs.into_iter().reduce(T::merge)
    }

    pub fn save<T: Config + Serialize>(&self, name: impl fmt::Display, config: &T) -> Result<(), SaveError> {
        let domain = T::domain();

        let search = match &self.scope {
            Scope::System(root) => Search::System {
                root: root.clone(),
                base: Base::Admin,
            },
            Scope::User(root) => Search::Home(root.clone()),
        };
        let dir = search.dir(&self.program, &domain);

        fs::create_dir_all(&dir).map_err(|io| SaveError::CreateDir(dir.clone(), io))?;

        let path = dir.join(format!("{name}.{EXTENSION}"));

        let serialized = serde_yaml::to_string(config)?;

        fs::write(&path, serialized).map_err(|io| SaveError::Write(path, io))?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("create config dir {0:?}")]
    CreateDir(PathBuf, #[source] std::io::Error),
    #[error("serialize config")]
    Yaml(#[from] serde_yaml::Error),
    #[error("write config file {0:?}")]
    Write(PathBuf, #[source] std::io::Error),
}

fn enumerate_paths(entry: Entry, search: &Search, program: &str, domain: &str) -> Vec<PathBuf> {
    match entry {
        Entry::File => {
            let file = search.file(program, domain);

            if file.exists() {
                vec![file]
            } else {
                vec![]
            }
        }
        Entry::Directory => {
            let Ok(read_dir) = fs::read_dir(search.dir(program, domain)) else {
                return vec![];
            };

            read_dir
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
                    path.exists() && extension == EXTENSION
                })
                .collect()
        }
    }
}

fn read_config<T: Config>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    serde_yaml::from_slice(&bytes).ok()
}

#[derive(Clone, Copy)]
enum Base {
    Admin,
    Vendor,
}

impl Base {
    fn path(&self) -> &'static str {
        match self {
            Base::Admin => "etc",
            Base::Vendor => "usr/share",
        }
    }
}

enum Entry {
    File,
    Directory,
}

enum Search {
    System { root: PathBuf, base: Base },
    Home(PathBuf),
}

impl Search {
    fn file(&self, program: &str, domain: &str) -> PathBuf {
        match self {
            Search::System { root, base } => root.join(base.path()).join(program),
            Search::Home(root) => root.join(program),
        }
        .join(format!("{domain}.{EXTENSION}"))
    }

    fn dir(&self, program: &str, domain: &str) -> PathBuf {
        match self {
            Search::System { root, base } => root.join(base.path()).join(program).join(format!("{domain}.d")),
            Search::Home(root) => root.join(program).join(format!("{domain}.d")),
        }
    }
}

#[derive(Debug, Clone)]
enum Scope {
    System(PathBuf),
    User(PathBuf),
}
