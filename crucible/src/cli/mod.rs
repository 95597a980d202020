// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Argument parsing and verb dispatch, grounded on `boulder::cli`'s
//! `Command { global, subcommand }` shape — a flattened set of global flags
//! plus one variant per verb, each delegating to its own module.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

mod module;
mod query;
mod repo;
mod transact;

use crate::settings::Settings;
use crate::engine::Engine;

#[derive(Debug, Parser)]
#[command(name = "crucible", about = "A source-based package manager")]
pub struct Command {
    #[command(flatten)]
    pub global: Global,
    #[command(subcommand)]
    pub verb: Verb,
}

#[derive(Debug, Args)]
pub struct Global {
    /// Repeat for more detail (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Treat this directory as the live install root instead of `/`.
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,
    /// Recompile every recipe before acting.
    #[arg(long, global = true)]
    pub rebuild: bool,
    /// Pull every recipe repository before acting.
    #[arg(long, global = true)]
    pub sync: bool,
    #[arg(long, global = true)]
    pub force: bool,
    /// Skip dependency closure (install/uninstall only the named packages).
    #[arg(long, global = true)]
    pub only: bool,
    /// Compute the transaction but do not commit it to the live root.
    #[arg(long, global = true)]
    pub pretend: bool,
    #[arg(long, global = true)]
    pub keep_fakeroot: bool,
    /// `update`: keep the cached source when a recipe can't incrementally
    /// refresh it, instead of discarding it and re-downloading.
    #[arg(long, global = true)]
    pub keep_cache: bool,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum Verb {
    Install { names: Vec<String> },
    Uninstall { names: Vec<String> },
    Update { names: Vec<String> },
    Clean,
    List,
    Search { pattern: String },
    Deps { name: String },
    ListDeps,
    Files { name: String },
    Info { names: Vec<String> },
    New { names: Vec<String> },
    Edit { names: Vec<String> },
    Drop { name: String },
    Restore { name: String },
    AddRepo { url: String },
    DropRepo { name: String },
    SaveDep { name: String },
}

pub fn process() -> Result<(), Error> {
    run(Command::parse())
}

pub fn run(command: Command) -> Result<(), Error> {
    let global = &command.global;

    let settings = Settings::load(&global.root);
    settings.ensure_directories()?;

    if global.sync {
        repo::sync(&settings)?;
    }

    if global.rebuild || !settings.artifacts_dir.is_dir() {
        let report = recipe::compile(&settings.modules_dir, &settings.artifacts_dir)?;
        for (repository, stats) in &report.per_repository {
            log::info!("{repository}: {} compiled, {} failed", stats.compiled, stats.failed);
        }
    }

    let records: HashMap<String, recipe::PackageRecord> =
        recipe::load(&settings.artifacts_dir)?.into_iter().map(|r| (r.name().to_string(), r)).collect();

    let catalog = catalog::Catalog::new(&settings.catalog_path().to_string_lossy())?;

    // Every loaded recipe gets (or keeps) a catalog row, so a package whose
    // row was dropped reappears on the next `--rebuild` without requiring a
    // fresh `install`. `is_explicit: false` never demotes an existing
    // explicit row — `register` only ever promotes — so this preserves
    // whatever explicit/implicit status the catalog already has on record.
    for record in records.values() {
        catalog.register(
            record.name(),
            record.version(),
            record.description(),
            record.website(),
            record.dependencies(),
            false,
            Some(record.repository()),
        )?;
    }

    let engine = Engine {
        settings: &settings,
        catalog: &catalog,
        records: &records,
        keep_fakeroot: global.keep_fakeroot,
        pretend: global.pretend,
        only: global.only,
    };

    match command.verb {
        Verb::Install { names } => transact::install(&engine, &names)?,
        Verb::Uninstall { names } => transact::uninstall(&engine, &names, global.force)?,
        Verb::Update { names } => transact::update(&engine, &names, global.force, global.keep_cache)?,
        Verb::Clean => transact::clean(&engine)?,
        Verb::List => query::list(&catalog)?,
        Verb::Search { pattern } => query::search(&catalog, &pattern)?,
        Verb::Deps { name } => query::deps(&records, &name)?,
        Verb::ListDeps => query::list_deps(&catalog)?,
        Verb::Files { name } => query::files(&catalog, &name)?,
        Verb::Info { names } => query::info(&catalog, &records, &names)?,
        Verb::New { names } => module::new(&settings, &names)?,
        Verb::Edit { names } => module::edit(&settings, &names)?,
        Verb::Drop { name } => module::drop(&settings, &catalog, &name)?,
        Verb::Restore { name } => module::restore(&settings, &name)?,
        Verb::AddRepo { url } => repo::add(&settings, &url)?,
        Verb::DropRepo { name } => repo::drop(&engine, &settings, &name, global.force)?,
        Verb::SaveDep { name } => repo::save_dep(&catalog, &name)?,
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog")]
    Catalog(#[from] catalog::Error),
    #[error("recipe")]
    Recipe(#[from] recipe::Error),
    #[error("transaction")]
    Engine(#[from] crate::error::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Query(String),
    #[error(transparent)]
    Module(#[from] module::Error),
    #[error(transparent)]
    Repo(#[from] repo::Error),
}
