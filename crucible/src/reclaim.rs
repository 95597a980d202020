// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Orphan reclamation for the `clean` verb: repeatedly uninstall packages
//! that were only ever pulled in as a dependency and that nothing
//! installed still depends on, until a fixed point is reached.

use crate::engine::Engine;
use crate::error::Error;

/// Returns the names removed, in the order they were uninstalled.
pub fn clean(engine: &Engine<'_>) -> Result<Vec<String>, Error> {
    let mut removed = vec![];

    loop {
        let orphans = engine.orphans()?;

        if orphans.is_empty() {
            break;
        }

        for name in orphans {
            log::info!("reclaiming orphaned dependency {name:?}");
            engine.uninstall(&name, true)?;
            removed.push(name);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::settings::Settings;

    #[test]
    fn clean_reclaims_chained_orphans_to_a_fixed_point() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());
        let catalog = catalog::Catalog::new(":memory:").unwrap();
        let records = HashMap::new();

        // top (explicit) -> mid (implicit) -> leaf (implicit)
        catalog.register("mid", "1.0", "mid", None, &["leaf".to_string()], false, None).unwrap();
        catalog.register("top", "1.0", "top", None, &["mid".to_string()], true, None).unwrap();
        catalog.mark_installed("top", "/src/top").unwrap();
        catalog.mark_installed("mid", "/src/mid").unwrap();
        catalog.mark_installed("leaf", "/src/leaf").unwrap();

        let engine = Engine { settings: &settings, catalog: &catalog, records: &records, keep_fakeroot: false, pretend: false, only: false };

        // Uninstalling "top" leaves "mid" orphaned, then "leaf" once "mid" is gone.
        engine.uninstall("top", true).unwrap();

        let removed = clean(&engine).unwrap();

        assert_eq!(removed, vec!["mid".to_string(), "leaf".to_string()]);
        assert!(engine.orphans().unwrap().is_empty());
    }

    #[test]
    fn clean_is_a_no_op_when_nothing_is_orphaned() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings::load(root.path());
        let catalog = catalog::Catalog::new(":memory:").unwrap();
        let records = HashMap::new();

        catalog.register("top", "1.0", "top", None, &[], true, None).unwrap();
        catalog.mark_installed("top", "/src/top").unwrap();

        let engine = Engine { settings: &settings, catalog: &catalog, records: &records, keep_fakeroot: false, pretend: false, only: false };

        assert!(clean(&engine).unwrap().is_empty());
    }
}
