//! External process execution.
//!
//! Build tools, package managers and inspection tools are all run through the
//! [`Executor`] trait so that the pipeline can be driven by a fake in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command failed with exit code {code:?}: {cmd}")]
  Failed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// A command line to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmd {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

impl Cmd {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Path argument, converted lossily.
  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy())
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }
}

impl fmt::Display for Cmd {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
  /// Exit code, `None` if the process was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl Output {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs external commands.
#[async_trait]
pub trait Executor: Send + Sync {
  /// Run `cmd` to completion and capture its output, whatever the exit code.
  async fn output(&self, cmd: &Cmd) -> Result<Output, ExecError>;

  /// Run `cmd` and return its trimmed stdout, failing on a non-zero exit.
  async fn run(&self, cmd: &Cmd) -> Result<String, ExecError> {
    let output = self.output(cmd).await?;
    if !output.success() {
      if !output.stderr.is_empty() {
        debug!(stderr = %output.stderr, "command stderr");
      }
      if !output.stdout.is_empty() {
        debug!(stdout = %output.stdout, "command stdout");
      }
      return Err(ExecError::Failed {
        cmd: cmd.to_string(),
        code: output.code,
        stderr: output.stderr,
      });
    }
    Ok(output.stdout.trim().to_string())
  }
}

/// Runs commands as child processes of the current process, inheriting its
/// environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
  async fn output(&self, cmd: &Cmd) -> Result<Output, ExecError> {
    info!(cmd = %cmd, "executing command");

    let mut command = Command::new(&cmd.program);
    command.args(&cmd.args);
    if let Some(cwd) = &cmd.cwd {
      command.current_dir(cwd);
    }
    for (key, value) in &cmd.env {
      command.env(key, value);
    }

    debug!(program = %cmd.program, working_dir = ?cmd.cwd, "spawning process");

    let output = command.output().await.map_err(|source| ExecError::Spawn {
      program: cmd.program.clone(),
      source,
    })?;

    Ok(Output {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_joins_arguments() {
    let cmd = Cmd::new("cabal").args(["install", "Agda-2.6.4"]).arg("--installdir=/tmp/bin");
    assert_eq!(cmd.to_string(), "cabal install Agda-2.6.4 --installdir=/tmp/bin");
  }

  #[tokio::test]
  async fn missing_program_is_spawn_error() {
    let result = ProcessExecutor.output(&Cmd::new("agdist-no-such-program")).await;
    assert!(matches!(result, Err(ExecError::Spawn { .. })));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn run_returns_trimmed_stdout() {
    let cmd = Cmd::new("sh").args(["-c", "echo \"  $GREETING  \""]).env("GREETING", "hello");
    assert_eq!(ProcessExecutor.run(&cmd).await.unwrap(), "hello");
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn run_fails_on_non_zero_exit() {
    let cmd = Cmd::new("sh").args(["-c", "echo oops >&2; exit 3"]);
    match ProcessExecutor.run(&cmd).await {
      Err(ExecError::Failed { code, stderr, .. }) => {
        assert_eq!(code, Some(3));
        assert_eq!(stderr.trim(), "oops");
      }
      other => panic!("expected failure, got {other:?}"),
    }
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn runs_in_working_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let cmd = Cmd::new("pwd").cwd(dir.path());
    let out = ProcessExecutor.run(&cmd).await.unwrap();
    assert_eq!(
      std::fs::canonicalize(out).unwrap(),
      std::fs::canonicalize(dir.path()).unwrap()
    );
  }
}
