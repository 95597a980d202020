// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Recipe source lifecycle verbs: `new`, `edit`, `drop`, `restore`.

use fs_err as fs;
use thiserror::Error;

use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum Error {
    #[error("recipe")]
    Recipe(#[from] recipe::Error),
    #[error("catalog")]
    Catalog(#[from] catalog::Error),
    #[error("runner")]
    Runner(#[from] runner::Error),
    #[error("no recipe named {0:?} found in any repository")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn new(settings: &Settings, names: &[String]) -> Result<(), Error> {
    for name in names {
        let path = recipe::new_recipe(&settings.modules_dir, name)?;
        println!("created {}", path.display());
    }

    Ok(())
}

pub fn edit(settings: &Settings, names: &[String]) -> Result<(), Error> {
    let editor = runner::env_var("EDITOR").unwrap_or_else(|| "vi".to_string());

    for name in names {
        let path = recipe::find_recipe_path(&settings.modules_dir, name)?.ok_or_else(|| Error::NotFound(name.clone()))?;

        runner::execute(&format!("{editor} {}", path.display()))?;
    }

    Ok(())
}

pub fn drop(settings: &Settings, catalog: &catalog::Catalog, name: &str) -> Result<(), Error> {
    let tombstone = recipe::drop_recipe(&settings.modules_dir, name)?;

    if catalog.package(name)?.is_some() {
        catalog.delete_package(name)?;
    }

    let artifact = settings.artifacts_dir.join(format!("{name}.cache"));
    if let Err(err) = fs::remove_file(&artifact) {
        if err.kind() != std::io::ErrorKind::NotFound {
            return Err(Error::Io(err));
        }
    }

    println!("dropped {name}, tombstoned at {}", tombstone.display());

    Ok(())
}

pub fn restore(settings: &Settings, name: &str) -> Result<(), Error> {
    let path = recipe::restore_recipe(&settings.modules_dir, name)?;
    println!("restored {}", path.display());

    Ok(())
}
