//! Test helpers for agdist-lib.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::exec::{Cmd, ExecError, Executor, Output};

type Responder = Box<dyn Fn(&Cmd) -> Output + Send + Sync>;

/// An executor that records every command and answers from a closure.
pub struct RecordingExecutor {
  calls: Mutex<Vec<Cmd>>,
  respond: Responder,
}

impl RecordingExecutor {
  pub fn new(respond: impl Fn(&Cmd) -> Output + Send + Sync + 'static) -> Self {
    Self {
      calls: Mutex::new(Vec::new()),
      respond: Box::new(respond),
    }
  }

  /// Every command exits 0 with no output.
  pub fn succeeding() -> Self {
    Self::new(|_| ok(""))
  }

  pub fn calls(&self) -> Vec<Cmd> {
    self.calls.lock().unwrap().clone()
  }

  /// Recorded commands rendered as strings.
  pub fn command_lines(&self) -> Vec<String> {
    self.calls().iter().map(Cmd::to_string).collect()
  }
}

#[async_trait]
impl Executor for RecordingExecutor {
  async fn output(&self, cmd: &Cmd) -> Result<Output, ExecError> {
    self.calls.lock().unwrap().push(cmd.clone());
    Ok((self.respond)(cmd))
  }
}

/// A successful output with `stdout`.
pub fn ok(stdout: &str) -> Output {
  Output {
    code: Some(0),
    stdout: stdout.to_string(),
    stderr: String::new(),
  }
}

/// A failed output with `stderr`.
pub fn failed(stderr: &str) -> Output {
  Output {
    code: Some(1),
    stdout: String::new(),
    stderr: stderr.to_string(),
  }
}
