// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The transaction verbs: `install`, `uninstall`, `update`, `clean`.

use crate::engine::Engine;
use crate::error::Error;
use crate::reclaim;

pub fn install(engine: &Engine<'_>, names: &[String]) -> Result<(), Error> {
    engine.install_targets(names)?;

    if !engine.pretend {
        println!("installed: {}", names.join(", "));
    }

    Ok(())
}

/// `force` requests that the cached source tree be dropped along with the
/// install; otherwise it's retained for a future rebuild.
pub fn uninstall(engine: &Engine<'_>, names: &[String], force: bool) -> Result<(), Error> {
    for name in names {
        engine.uninstall(name, force)?;
        println!("uninstalled: {name}");
    }

    Ok(())
}

/// `name(s)` empty means every installed package. `force` rebuilds even a
/// package `update()` reports up-to-date. `keep_cache` skips discarding the
/// cached source when `get_changes()` is absent or fails (spec's own
/// suggestion for recipes that can't incrementally refresh but whose cache
/// shouldn't be thrown away regardless).
pub fn update(engine: &Engine<'_>, names: &[String], force: bool, keep_cache: bool) -> Result<(), Error> {
    let targets: Vec<String> = if names.is_empty() {
        engine
            .catalog
            .all_packages()?
            .into_iter()
            .filter(|p| p.installed)
            .map(|p| p.name)
            .collect()
    } else {
        names.to_vec()
    };

    for name in &targets {
        let status = engine.update_status(name)?;

        if status == recipe::UpdateStatus::UpToDate && !force {
            println!("{name}: up-to-date");
            continue;
        }

        engine.refresh_source(name, keep_cache)?;
        engine.uninstall(name, false)?;
        engine.install_targets(std::slice::from_ref(name))?;
        println!("{name}: rebuilt");
    }

    Ok(())
}

pub fn clean(engine: &Engine<'_>) -> Result<(), Error> {
    let removed = reclaim::clean(engine)?;

    if removed.is_empty() {
        println!("nothing to reclaim");
    } else {
        println!("reclaimed: {}", removed.join(", "));
    }

    Ok(())
}
