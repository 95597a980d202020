// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Top-level error type, aggregating every crate's own error enum the way
//! `moss::cli`'s `process()` surfaces each subsystem's error as one
//! `anyhow`-free, enumerated failure.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("package {0:?} is not known to any loaded module")]
    UnknownPackage(String),
    #[error("package {0:?} has no download() section and no cached source to reuse")]
    NoSource(String),
    #[error("recipe {0:?} produced no install() output under its fakeroot")]
    NoInstallOutput(String),
    #[error("{0:?} is not a regular file or symlink, skipping with a warning rather than committing it")]
    UnsupportedFileKind(PathBuf),
    #[error("dependency graph")]
    Dag(#[from] dag::Error<String>),
    #[error("catalog")]
    Catalog(#[from] catalog::Error),
    #[error("recipe")]
    Recipe(#[from] recipe::Error),
    #[error("fakeroot")]
    Fakeroot(#[from] fakeroot::Error),
    #[error("filesystem utility")]
    Fsutil(#[from] fsutil::Error),
    #[error("command runner")]
    Runner(#[from] runner::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
