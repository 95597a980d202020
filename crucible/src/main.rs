// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

mod cli;
mod settings;
mod engine;
mod error;
mod reclaim;

#[cfg(test)]
mod integration_test;

use std::error::Error as _;

use clap::Parser;

fn main() {
    let command = cli::Command::parse();

    let level = match command.global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = cli::run(command) {
        log::error!("{err}");

        let mut source = err.source();
        while let Some(cause) = source {
            log::error!("caused by: {cause}");
            source = cause.source();
        }

        std::process::exit(1);
    }
}
