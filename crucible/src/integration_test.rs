// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end coverage of `Engine::install_targets` against fake in-process
//! `recipe::PackageRecord`s, a real fakeroot sandbox, and a `:memory:`
//! catalog, standing in for a live root under a temp directory. A recipe's
//! `download()` needs an actual `git-clone` to produce a source directory,
//! so each fixture clones from a throwaway local repository rather than the
//! network.

use std::collections::HashMap;
use std::path::Path;

use fs_err as fs;

use crate::engine::Engine;
use crate::settings::Settings;
use recipe::PackageRecord;

fn init_upstream_repo(path: &Path) {
    fs::create_dir_all(path).unwrap();

    runner::with_dir(path, || {
        runner::execute(
            "git init -q && \
             git config user.email test@example.com && \
             git config user.name test && \
             echo payload > file.txt && \
             git add -A && \
             git commit -q -m init",
        )
    })
    .unwrap();
}

/// Build a `PackageRecord` that clones `upstream`, runs `build_step` inside
/// the fakeroot's `buildsrc`, and (if it gets that far) copies `file.txt`
/// into `$DESTDIR/usr/bin/<name>`.
fn record(name: &str, deps: &[&str], upstream: &Path, build_step: &str) -> PackageRecord {
    let deps_yaml = deps.iter().map(|d| format!("{d:?}")).collect::<Vec<_>>().join(", ");

    let yaml = format!(
        "name: {name}\n\
         version: \"1.0\"\n\
         description: \"test package\"\n\
         dependencies: [{deps_yaml}]\n\
         download:\n  - git-clone: {upstream:?}\n\
         build:\n  - run: {build_step:?}\n\
         install:\n  - run: \"mkdir -p $DESTDIR/usr/bin && cp file.txt $DESTDIR/usr/bin/{name}\"\n\
         update:\n  git: true\n"
    );

    PackageRecord::from(recipe::format::from_slice(yaml.as_bytes()).unwrap())
}

fn engine<'a>(settings: &'a Settings, catalog: &'a catalog::Catalog, records: &'a HashMap<String, PackageRecord>) -> Engine<'a> {
    Engine { settings, catalog, records, keep_fakeroot: false, pretend: false, only: false }
}

#[test]
fn scenario_1_chained_install_commits_target_and_dependency() {
    let workdir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let settings = Settings::load(root.path());

    let dep_upstream = workdir.path().join("upstream-dep");
    let top_upstream = workdir.path().join("upstream-top");
    init_upstream_repo(&dep_upstream);
    init_upstream_repo(&top_upstream);

    let mut records = HashMap::new();
    records.insert("dep".to_string(), record("dep", &[], &dep_upstream, "true"));
    records.insert("top".to_string(), record("top", &["dep"], &top_upstream, "true"));

    let catalog = catalog::Catalog::new(":memory:").unwrap();
    let eng = engine(&settings, &catalog, &records);

    eng.install_targets(&["top".to_string()]).unwrap();

    assert!(root.path().join("usr/bin/top").is_file());
    assert!(root.path().join("usr/bin/dep").is_file());

    let top = catalog.package("top").unwrap().unwrap();
    assert!(top.installed);
    assert!(top.is_explicit);

    let dep = catalog.package("dep").unwrap().unwrap();
    assert!(dep.installed);
    assert!(!dep.is_explicit, "pulled in only as a dependency");
}

#[test]
fn scenario_3_build_failure_leaves_no_trace() {
    let workdir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let settings = Settings::load(root.path());

    let upstream = workdir.path().join("upstream-broken");
    init_upstream_repo(&upstream);

    let mut records = HashMap::new();
    records.insert("broken".to_string(), record("broken", &[], &upstream, "false"));

    let catalog = catalog::Catalog::new(":memory:").unwrap();
    let eng = engine(&settings, &catalog, &records);

    assert!(eng.install_targets(&["broken".to_string()]).is_err());

    assert!(!root.path().join("usr/bin/broken").exists());
    assert_eq!(catalog.is_installed("broken").unwrap(), Some(false));
    assert!(catalog.files_of(catalog.lookup_id("broken").unwrap().unwrap()).unwrap().is_empty());
}

#[test]
fn scenario_4_clean_reclaims_an_orphan_and_its_committed_files() {
    let workdir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let settings = Settings::load(root.path());

    let dep_upstream = workdir.path().join("upstream-dep");
    let top_upstream = workdir.path().join("upstream-top");
    init_upstream_repo(&dep_upstream);
    init_upstream_repo(&top_upstream);

    let mut records = HashMap::new();
    records.insert("dep".to_string(), record("dep", &[], &dep_upstream, "true"));
    records.insert("top".to_string(), record("top", &["dep"], &top_upstream, "true"));

    let catalog = catalog::Catalog::new(":memory:").unwrap();
    let eng = engine(&settings, &catalog, &records);

    eng.install_targets(&["top".to_string()]).unwrap();
    assert!(root.path().join("usr/bin/dep").is_file());

    eng.uninstall("top", true).unwrap();

    let removed = crate::reclaim::clean(&eng).unwrap();
    assert_eq!(removed, vec!["dep".to_string()]);

    assert!(!root.path().join("usr/bin/dep").exists());
    assert_eq!(catalog.is_installed("dep").unwrap(), Some(false));
}

#[test]
fn scenario_6_update_status_is_up_to_date_right_after_install() {
    let workdir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let settings = Settings::load(root.path());

    let upstream = workdir.path().join("upstream-solo");
    init_upstream_repo(&upstream);

    let mut records = HashMap::new();
    records.insert("solo".to_string(), record("solo", &[], &upstream, "true"));

    let catalog = catalog::Catalog::new(":memory:").unwrap();
    let eng = engine(&settings, &catalog, &records);

    eng.install_targets(&["solo".to_string()]).unwrap();

    assert_eq!(eng.update_status("solo").unwrap(), recipe::UpdateStatus::UpToDate);

    // Pure status check: nothing about the installed row changes.
    let solo = catalog.package("solo").unwrap().unwrap();
    assert!(solo.installed);
}
