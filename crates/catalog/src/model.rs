// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use diesel::prelude::*;

use super::schema::{dependencies, files, packages};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = packages)]
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

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = packages)]
pub struct NewPackage<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub description: &'a str,
    pub website: Option<&'a str>,
    pub installed: bool,
    pub is_explicit: bool,
    pub source_location: Option<&'a str>,
    pub repository: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = dependencies)]
pub struct DependencyEdge {
    pub id: i32,
    pub package_id: i32,
    pub dependency_id: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dependencies)]
pub struct NewDependencyEdge {
    pub package_id: i32,
    pub dependency_id: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = files)]
pub struct FileRow {
    pub id: i32,
    pub package_id: i32,
    pub absolute_path: String,
    pub size: i64,
    pub mode: i32,
    pub mtime: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = files)]
pub struct NewFileRow<'a> {
    pub package_id: i32,
    pub absolute_path: &'a str,
    pub size: i64,
    pub mode: i32,
    pub mtime: i64,
}
