// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Read-only verbs: `list`, `search`, `deps`, `list-deps`, `files`, `info`.

use std::collections::HashMap;

use regex::RegexBuilder;

use super::Error;

pub fn list(catalog: &catalog::Catalog) -> Result<(), Error> {
    for package in catalog.all_packages()? {
        print_package_line(&package);
    }

    Ok(())
}

pub fn search(catalog: &catalog::Catalog, pattern: &str) -> Result<(), Error> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Query(format!("invalid pattern {pattern:?}: {e}")))?;

    for package in catalog.all_packages()? {
        if regex.is_match(&package.name) {
            print_package_line(&package);
        }
    }

    Ok(())
}

fn print_package_line(package: &catalog::Package) {
    let status = if package.installed { "installed" } else { "available" };
    let explicit = if package.is_explicit { "explicit" } else { "implicit" };
    println!("{} {} {status} {explicit}", package.name, package.version);
}

pub fn deps(records: &HashMap<String, recipe::PackageRecord>, name: &str) -> Result<(), Error> {
    let record = records.get(name).ok_or_else(|| Error::Query(format!("no loaded module named {name:?}")))?;

    for dep in record.dependencies() {
        println!("{dep}");
    }

    Ok(())
}

pub fn list_deps(catalog: &catalog::Catalog) -> Result<(), Error> {
    for package in catalog.all_packages()? {
        if !package.installed || package.is_explicit {
            continue;
        }

        let dependents = catalog.dependents_of(&package.name)?;
        println!("{}: {}", package.name, dependents.join(", "));
    }

    Ok(())
}

pub fn files(catalog: &catalog::Catalog, name: &str) -> Result<(), Error> {
    let package = catalog.package(name)?.ok_or_else(|| Error::Query(format!("unknown package {name:?}")))?;

    for path in catalog.files_of(package.id)? {
        println!("{path}");
    }

    Ok(())
}

pub fn info(
    catalog: &catalog::Catalog,
    records: &HashMap<String, recipe::PackageRecord>,
    names: &[String],
) -> Result<(), Error> {
    for name in names {
        let package = catalog.package(name)?;
        let record = records.get(name.as_str());

        match (package, record) {
            (Some(package), Some(record)) => {
                println!("{}: {}", package.name, package.description);
                println!("  version: {}", package.version);
                println!("  installed: {}", package.installed);
                println!("  explicit: {}", package.is_explicit);
                println!("  dependencies: {}", record.dependencies().join(", "));
            }
            (Some(package), None) => {
                println!("{}: {} (no recipe currently loaded)", package.name, package.description);
            }
            (None, Some(record)) => {
                println!("{name}: {} (not installed)", record.description());
                println!("  dependencies: {}", record.dependencies().join(", "));
            }
            (None, None) => {
                return Err(Error::Query(format!("unknown package {name:?}")));
            }
        }
    }

    Ok(())
}
