//! External engine invocation.
//!
//! The engine is an opaque process: a fresh start feeds the declarative
//! script on standard input, a resume passes the checkpoint file path as the
//! sole argument. Exit status zero covers both full completion and a
//! time-budget checkpoint-and-exit; the two are indistinguishable at this
//! layer.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use fh_core::errors::{ErrorInfo, FhError};
use serde::{Deserialize, Serialize};

/// Outcome of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Zero exit status: completed, or checkpointed and stopped early.
    Success,
    /// Non-zero exit status.
    Failure(i32),
}

impl EngineStatus {
    /// Whether the invocation exited with status zero.
    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Success)
    }
}

/// Capability interface for launching the external engine.
///
/// Test doubles implement this deterministically; production code uses
/// [`ProcessEngine`].
pub trait Engine {
    /// Starts the engine fresh with the given script on standard input,
    /// capturing stdout to `log`.
    fn fresh(&self, script: &Path, log: &Path) -> Result<EngineStatus, FhError>;

    /// Resumes the engine from the given checkpoint file, capturing stdout
    /// to `log`.
    fn resume(&self, checkpoint: &Path, log: &Path) -> Result<EngineStatus, FhError>;
}

/// Engine backed by external processes.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    fresh_command: PathBuf,
    resume_command: PathBuf,
}

impl ProcessEngine {
    /// Creates a process engine from the configured binary locations.
    pub fn new(fresh_command: PathBuf, resume_command: PathBuf) -> Self {
        Self {
            fresh_command,
            resume_command,
        }
    }

    fn wait(&self, mut command: Command, code: &str) -> Result<EngineStatus, FhError> {
        let status = command.status().map_err(|err| {
            FhError::Engine(
                ErrorInfo::new(code, err.to_string())
                    .with_hint("check the engine binary paths in the run configuration"),
            )
        })?;
        if status.success() {
            Ok(EngineStatus::Success)
        } else {
            Ok(EngineStatus::Failure(status.code().unwrap_or(-1)))
        }
    }
}

fn open_for(path: &Path, code: &str) -> Result<File, FhError> {
    File::open(path).map_err(|err| {
        FhError::Engine(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

fn create_for(path: &Path, code: &str) -> Result<File, FhError> {
    File::create(path).map_err(|err| {
        FhError::Engine(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

impl Engine for ProcessEngine {
    fn fresh(&self, script: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        let stdin = open_for(script, "script-open")?;
        let stdout = create_for(log, "log-create")?;
        let mut command = Command::new(&self.fresh_command);
        command
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout));
        self.wait(command, "fresh-spawn")
    }

    fn resume(&self, checkpoint: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        let stdout = create_for(log, "log-create")?;
        let mut command = Command::new(&self.resume_command);
        command.arg(checkpoint).stdout(Stdio::from(stdout));
        self.wait(command, "resume-spawn")
    }
}
