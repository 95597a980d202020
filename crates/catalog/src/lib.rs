// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Persistent store of packages, dependency edges, and owned files, backed
//! by SQLite through `diesel`. Grounded on `moss`'s `db::layout` database:
//! a `Connection(Arc<Mutex<SqliteConnection>>)` wrapper exposing `exec` for
//! plain reads and `exclusive_tx` for a single serialized writer, embedded
//! migrations, and a private `model` submodule of `Queryable`/`Insertable`
//! row types mirroring the `diesel::table!` schema.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

mod model;
mod schema;

use schema::{dependencies, files, packages};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Error)]
pub enum Error {
    #[error("row not found")]
    RowNotFound,
    #[error("file size {0} does not fit in a 64-bit signed column")]
    SizeOutOfRange(u64),
    #[error("package {0:?} declares a dependency on itself")]
    SelfDependency(String),
    #[error("invalid mtime: {0}")]
    InvalidMtime(i64),
    #[error("diesel")]
    Diesel(#[from] diesel::result::Error),
    #[error("diesel connection")]
    Connection(#[from] diesel::ConnectionError),
    #[error("diesel migration")]
    Migration(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[derive(Clone)]
struct Connection(Arc<Mutex<SqliteConnection>>);

impl Connection {
    fn new(connection: SqliteConnection) -> Self {
        Self(Arc::new(Mutex::new(connection)))
    }

    fn exec<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.0.lock().expect("catalog connection mutex poisoned");
        f(&mut guard)
    }

    fn exclusive_tx<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.0.lock().expect("catalog connection mutex poisoned");
        guard.transaction(f)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish()
    }
}

/// A package row as read back from the catalog.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: i32,
    pub name: String,
    pub version: String,
    pub description: String,
    pub website: Option<String>,
    pub installed: bool,
    pub is_explicit: bool,
    pub source_location: Option<String>,
    pub repository: Option<String>,
}

impl From<model::Package> for Package {
    fn from(row: model::Package) -> Self {
        Package {
            id: row.id,
            name: row.name,
            version: row.version,
            description: row.description,
            website: row.website,
            installed: row.installed,
            is_explicit: row.is_explicit,
            source_location: row.source_location,
            repository: row.repository,
        }
    }
}

/// One file committed to the live root on behalf of a package.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub absolute_path: String,
    pub size: u64,
    pub mode: u32,
    pub mtime: i64,
}

/// A unix timestamp decoded from the `mtime`/similar BigInt columns, for
/// callers (e.g. `files`/`info`) that want to render it.
pub struct Timestamp(pub DateTime<Utc>);

impl TryFrom<i64> for Timestamp {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(Self(
            NaiveDateTime::from_timestamp_opt(value, 0)
                .ok_or(Error::InvalidMtime(value))?
                .and_utc(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    pub fn new(url: &str) -> Result<Self, Error> {
        let mut conn = SqliteConnection::establish(url)?;

        conn.batch_execute("PRAGMA foreign_keys = ON;")?;
        conn.run_pending_migrations(MIGRATIONS).map_err(Error::Migration)?;

        log::debug!("opened catalog at {url}");

        Ok(Catalog {
            conn: Connection::new(conn),
        })
    }

    /// Upsert a package row by name, merging in a (possibly placeholder)
    /// row for each not-yet-known dependency so the edge's foreign keys are
    /// always satisfiable, then insert any missing dependency edges.
    /// `is_explicit` only ever promotes an existing row, never demotes it.
    /// `repository` of `None` leaves an existing row's repository untouched
    /// rather than clearing it, so a promotion like `save-dep` (which has
    /// no repository of its own to report) can't erase one already on file.
    pub fn register(
        &self,
        name: &str,
        version: &str,
        description: &str,
        website: Option<&str>,
        deps: &[String],
        is_explicit: bool,
        repository: Option<&str>,
    ) -> Result<i32, Error> {
        if deps.iter().any(|dep| dep == name) {
            return Err(Error::SelfDependency(name.to_string()));
        }

        self.conn.exclusive_tx(|tx| {
            let package_id = upsert_package(tx, name, version, description, website, is_explicit, repository)?;

            for dep in deps {
                let dep_id = match find_id_by_name(tx, dep)? {
                    Some(id) => id,
                    None => upsert_package(tx, dep, "", "", None, false, None)?,
                };

                let exists = dependencies::table
                    .filter(dependencies::package_id.eq(package_id))
                    .filter(dependencies::dependency_id.eq(dep_id))
                    .count()
                    .get_result::<i64>(tx)?
                    > 0;

                if !exists {
                    diesel::insert_into(dependencies::table)
                        .values(model::NewDependencyEdge {
                            package_id,
                            dependency_id: dep_id,
                        })
                        .execute(tx)?;
                }
            }

            Ok(package_id)
        })
    }

    pub fn lookup_id(&self, name: &str) -> Result<Option<i32>, Error> {
        self.conn.exec(|conn| find_id_by_name(conn, name))
    }

    pub fn package(&self, name: &str) -> Result<Option<Package>, Error> {
        self.conn.exec(|conn| {
            packages::table
                .filter(packages::name.eq(name))
                .select(model::Package::as_select())
                .first(conn)
                .optional()
                .map(|row| row.map(Package::from))
                .map_err(Error::from)
        })
    }

    pub fn all_packages(&self) -> Result<Vec<Package>, Error> {
        self.conn.exec(|conn| {
            Ok(packages::table
                .select(model::Package::as_select())
                .load(conn)?
                .into_iter()
                .map(Package::from)
                .collect())
        })
    }

    pub fn is_installed(&self, name: &str) -> Result<Option<bool>, Error> {
        self.conn.exec(|conn| {
            packages::table
                .filter(packages::name.eq(name))
                .select(packages::installed)
                .first(conn)
                .optional()
                .map_err(Error::from)
        })
    }

    pub fn mark_installed(&self, name: &str, source_location: &str) -> Result<(), Error> {
        self.conn.exclusive_tx(|tx| {
            let id = find_id_by_name(tx, name)?.ok_or(Error::RowNotFound)?;

            diesel::update(packages::table.find(id))
                .set((
                    packages::installed.eq(true),
                    packages::source_location.eq(Some(source_location)),
                ))
                .execute(tx)?;

            Ok(())
        })
    }

    pub fn mark_uninstalled(&self, name: &str, retain_source: bool) -> Result<(), Error> {
        self.conn.exclusive_tx(|tx| {
            let id = find_id_by_name(tx, name)?.ok_or(Error::RowNotFound)?;

            if retain_source {
                diesel::update(packages::table.find(id))
                    .set(packages::installed.eq(false))
                    .execute(tx)?;
            } else {
                diesel::update(packages::table.find(id))
                    .set((packages::installed.eq(false), packages::source_location.eq(None::<String>)))
                    .execute(tx)?;
            }

            Ok(())
        })
    }

    /// Bulk insert file rows for `package_id`, replacing any existing row
    /// with the same `(package_id, absolute_path)`.
    pub fn record_files(&self, package_id: i32, entries: &[FileEntry]) -> Result<(), Error> {
        self.conn.exclusive_tx(|tx| {
            for entry in entries {
                let size = i64::try_from(entry.size).map_err(|_| Error::SizeOutOfRange(entry.size))?;

                diesel::insert_into(files::table)
                    .values(model::NewFileRow {
                        package_id,
                        absolute_path: &entry.absolute_path,
                        size,
                        mode: entry.mode as i32,
                        mtime: entry.mtime,
                    })
                    .on_conflict((files::package_id, files::absolute_path))
                    .do_update()
                    .set((files::size.eq(size), files::mode.eq(entry.mode as i32), files::mtime.eq(entry.mtime)))
                    .execute(tx)?;
            }

            Ok(())
        })
    }

    pub fn clear_files(&self, package_id: i32) -> Result<(), Error> {
        self.conn.exclusive_tx(|tx| {
            diesel::delete(files::table.filter(files::package_id.eq(package_id))).execute(tx)?;
            Ok(())
        })
    }

    pub fn files_of(&self, package_id: i32) -> Result<Vec<String>, Error> {
        self.conn.exec(|conn| {
            files::table
                .filter(files::package_id.eq(package_id))
                .select(files::absolute_path)
                .load(conn)
                .map_err(Error::from)
        })
    }

    /// Installed packages with a dependency edge into `name`.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>, Error> {
        self.conn.exec(|conn| {
            let Some(id) = find_id_by_name(conn, name)? else {
                return Ok(vec![]);
            };

            let dependent_ids = dependencies::table
                .filter(dependencies::dependency_id.eq(id))
                .select(dependencies::package_id)
                .load::<i32>(conn)?;

            packages::table
                .filter(packages::id.eq_any(dependent_ids))
                .filter(packages::installed.eq(true))
                .select(packages::name)
                .load(conn)
                .map_err(Error::from)
        })
    }

    /// Delete the package row (cascading to its dependency edges and file
    /// rows). Tombstoning the recipe source file is the caller's
    /// responsibility (see `recipe::tombstone`) since the catalog has no
    /// notion of recipe repositories.
    pub fn delete_package(&self, name: &str) -> Result<(), Error> {
        self.conn.exclusive_tx(|tx| {
            let id = find_id_by_name(tx, name)?.ok_or(Error::RowNotFound)?;
            diesel::delete(packages::table.find(id)).execute(tx)?;
            Ok(())
        })
    }

    /// Packages whose `repository` column matches `repository`, for
    /// `drop-repo` to find what it owns before removing the directory.
    pub fn packages_in_repository(&self, repository: &str) -> Result<Vec<Package>, Error> {
        self.conn.exec(|conn| {
            Ok(packages::table
                .filter(packages::repository.eq(repository))
                .select(model::Package::as_select())
                .load(conn)?
                .into_iter()
                .map(Package::from)
                .collect())
        })
    }
}

fn find_id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<i32>, Error> {
    packages::table
        .filter(packages::name.eq(name))
        .select(packages::id)
        .first(conn)
        .optional()
        .map_err(Error::from)
}

fn upsert_package(
    conn: &mut SqliteConnection,
    name: &str,
    version: &str,
    description: &str,
    website: Option<&str>,
    is_explicit: bool,
    repository: Option<&str>,
) -> Result<i32, Error> {
    let existing = packages::table
        .filter(packages::name.eq(name))
        .select(model::Package::as_select())
        .first(conn)
        .optional()?;

    if let Some(existing) = existing {
        let repository = repository.map(str::to_string).or(existing.repository);

        diesel::update(packages::table.find(existing.id))
            .set((
                packages::version.eq(version),
                packages::description.eq(description),
                packages::website.eq(website),
                packages::is_explicit.eq(existing.is_explicit || is_explicit),
                packages::repository.eq(repository),
            ))
            .execute(conn)?;

        Ok(existing.id)
    } else {
        diesel::insert_into(packages::table)
            .values(model::NewPackage {
                name,
                version,
                description,
                website,
                installed: false,
                is_explicit,
                source_location: None,
                repository,
            })
            .execute(conn)?;

        find_id_by_name(conn, name)?.ok_or(Error::RowNotFound)
    }
}
