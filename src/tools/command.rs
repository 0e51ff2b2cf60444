//! External process execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: only the version-control and packaging
//!   executables can run
//! - **Injection prevention**: uses `tokio::process::Command`; arguments are
//!   passed as a slice, never interpolated into shell strings
//!
//! Two execution modes exist. Captured mode returns stdout for commands whose
//! result is consumed programmatically (pack, status, add, commit, tag,
//! branch); when such a command fails, its captured stdout/stderr are printed
//! before the error propagates so the user can diagnose the failure.
//! Inherited mode hands the standard streams to the child for commands whose
//! output the user should see live (clone, push).

use crate::core::error::PublishError;
use log::debug;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Allowed commands whitelist for security.
///
/// Only these commands can be executed by the publisher.
const ALLOWED_COMMANDS: &[&str] = &["git", "npm"];

fn check_allowed(program: &str) -> Result<(), PublishError> {
    if ALLOWED_COMMANDS.contains(&program) {
        return Ok(());
    }
    Err(PublishError::CommandSpawn {
        program: program.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "command is not in the allowed whitelist",
        ),
    })
}

/// Run a command and capture its output, returning stdout on success.
///
/// On a non-zero exit the captured stdout/stderr are printed before the
/// error is returned.
///
/// # Arguments
///
/// * `program` - The command to execute (must be in `ALLOWED_COMMANDS`)
/// * `args` - Command arguments, passed without shell interpretation
/// * `cwd` - Optional working directory for the child process
pub async fn run_captured(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<String, PublishError> {
    check_allowed(program)?;
    debug!("run (captured): {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|source| PublishError::CommandSpawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            print!("{stdout}");
        }
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }
        return Err(PublishError::CommandFailed {
            program: program.to_string(),
            args: args.join(" "),
            status: output.status,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command with inherited standard streams.
///
/// Used for clone and push, whose progress output belongs on the user's
/// terminal.
pub async fn run_inherited(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<(), PublishError> {
    check_allowed(program)?;
    debug!("run (inherited): {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let status = command
        .status()
        .await
        .map_err(|source| PublishError::CommandSpawn {
            program: program.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(PublishError::CommandFailed {
            program: program.to_string(),
            args: args.join(" "),
            status,
        });
    }

    Ok(())
}
