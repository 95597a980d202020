// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Executes shell commands on behalf of recipe steps, capturing output when
//! asked to and always restoring the working directory on scope exit.
//!
//! Grounded on the same shape as the original system's `cmd`/`cmdout`
//! helpers: commands run through the platform shell (`sh -c`), stdout
//! streams straight to the caller's own stdout for `execute`, and is
//! captured and trimmed for `capture_output`. Every command runs as the
//! current process user — elevation is the caller's responsibility.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("spawn command {0:?}")]
    Spawn(String, #[source] std::io::Error),
    #[error("command {0:?} exited with status {1}")]
    Failed(String, std::process::ExitStatus),
    #[error("command {0:?} produced non-utf8 output")]
    NonUtf8(String),
    #[error("get current directory")]
    GetCwd(#[source] std::io::Error),
    #[error("change directory to {0:?}")]
    SetCwd(PathBuf, #[source] std::io::Error),
}

/// Run `command` through the shell, streaming its stdout/stderr straight to
/// ours. Returns `Ok(())` only if the command exited with status 0.
pub fn execute(command: &str) -> Result<(), Error> {
    log::debug!("execute: {command}");

    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .map_err(|e| Error::Spawn(command.to_string(), e))?;

    if !status.success() {
        return Err(Error::Failed(command.to_string(), status));
    }

    Ok(())
}

/// Run `command` through the shell, capturing stdout. Returns the trimmed
/// stdout on success; a non-zero exit is a failure (the original's
/// `cmdout` additionally treats all-whitespace output as failure — mirrored
/// here by returning an empty string, which callers should treat as
/// "nothing produced" rather than ignoring the failure case entirely).
pub fn capture_output(command: &str) -> Result<String, Error> {
    log::debug!("capture_output: {command}");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|e| Error::Spawn(command.to_string(), e))?;

    if !output.status.success() {
        return Err(Error::Failed(command.to_string(), output.status));
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| Error::NonUtf8(command.to_string()))?;

    Ok(stdout.trim().to_string())
}

/// Look up an environment variable, returning `None` if unset or not valid
/// unicode.
pub fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Change into `dir`, run `f`, then restore the previous working directory
/// regardless of whether `f` succeeded — even if it returns an error, the
/// directory is still restored before the error propagates.
pub fn with_dir<T>(dir: impl AsRef<Path>, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    let dir = dir.as_ref();
    let previous = env::current_dir().map_err(Error::GetCwd)?;

    env::set_current_dir(dir).map_err(|e| Error::SetCwd(dir.to_path_buf(), e))?;

    let result = f();

    // Always attempt to restore, even if `f` failed; if restoring itself
    // fails we prefer to surface that over a swallowed original error only
    // when `f` actually succeeded.
    let restore = env::set_current_dir(&previous).map_err(|e| Error::SetCwd(previous.clone(), e));

    match (result, restore) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    static CWD_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn execute_success_and_failure() {
        assert!(execute("true").is_ok());
        assert!(execute("false").is_err());
    }

    #[test]
    fn capture_output_trims_whitespace() {
        let out = capture_output("printf '  hello world  \\n'").unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn capture_output_reports_failure() {
        assert!(capture_output("exit 7").is_err());
    }

    #[test]
    fn with_dir_restores_on_success_and_failure() {
        let _guard = CWD_LOCK.lock().unwrap();
        let start = env::current_dir().unwrap();
        let tmp = std::env::temp_dir();

        let _ = with_dir(&tmp, || Ok(()));
        assert_eq!(env::current_dir().unwrap(), tmp.canonicalize().unwrap_or(tmp.clone()));

        env::set_current_dir(&start).unwrap();

        let result: Result<(), Error> = with_dir(&tmp, || Err(Error::NonUtf8("x".into())));
        assert!(result.is_err());
        assert_eq!(env::current_dir().unwrap(), start.canonicalize().unwrap_or(start));
    }
}
