//! Hot restart: start the next process generation on the same socket.
//!
//! The successor is the current executable, started with
//! `--graceful -c <config path>` and the listening socket at fd 3. It is not
//! waited on; once it has been spawned the caller drains and exits.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use thiserror::Error;

use crate::net::inherit::{pass_to_child, ExportedListener};

/// Flag telling a new generation to adopt the inherited socket.
pub const GRACEFUL_FLAG: &str = "--graceful";

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("listening socket is not exportable on this process")]
    NotExported,
    #[error("cannot locate current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to spawn successor {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
}

/// Arguments the successor is started with.
pub fn successor_args(config_path: &Path) -> Vec<OsString> {
    vec![
        GRACEFUL_FLAG.into(),
        "-c".into(),
        config_path.as_os_str().to_owned(),
    ]
}

/// Spawn the current executable as the next generation.
pub fn spawn_successor(
    config_path: &Path,
    listener: Option<&ExportedListener>,
) -> Result<Child, HandoffError> {
    let listener = listener.ok_or(HandoffError::NotExported)?;
    let program = std::env::current_exe().map_err(HandoffError::CurrentExe)?;
    spawn_with(program, successor_args(config_path), listener)
}

fn spawn_with(
    program: PathBuf,
    args: Vec<OsString>,
    listener: &ExportedListener,
) -> Result<Child, HandoffError> {
    let mut command = Command::new(&program);
    command.args(args);
    pass_to_child(&mut command, listener);
    command
        .spawn()
        .map_err(|source| HandoffError::Spawn { program, source })
}
