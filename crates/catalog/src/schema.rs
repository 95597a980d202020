// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

diesel::table! {
    packages (id) {
        id -> Integer,
        name -> Text,
        version -> Text,
        description -> Text,
        website -> Nullable<Text>,
        installed -> Bool,
        is_explicit -> Bool,
        source_location -> Nullable<Text>,
        repository -> Nullable<Text>,
    }
}

diesel::table! {
    dependencies (id) {
        id -> Integer,
        package_id -> Integer,
        dependency_id -> Integer,
    }
}

diesel::table! {
    files (id) {
        id -> Integer,
        package_id -> Integer,
        absolute_path -> Text,
        size -> BigInt,
        mode -> Integer,
        mtime -> BigInt,
    }
}

diesel::joinable!(dependencies -> packages (package_id));
diesel::allow_tables_to_appear_in_same_query!(packages, dependencies, files);
