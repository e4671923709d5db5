//! Remote shell execution over SSH
//!
//! The deploy runner talks to a host through the [`RemoteShell`] trait.
//! Commands are logical shell fragments (`git pull`); scoped context commands
//! (`cd ...`, `rvm use ...`) entered via [`RemoteShell::enter`] apply to every
//! subsequent command until the matching [`RemoteShell::leave`].
//!
//! [`SshShell`] is the real implementation: one `ssh` invocation per issued
//! command, with the active scopes layered onto the wire command by
//! composition, so the remote side always evaluates a single fragment like
//! `cd ~/sites/devel.io && git pull`. Fragments are interpreted by the remote
//! login shell, which is where `~` expansion happens.

use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Exit status the ssh client itself reports for connection and protocol
/// failures, as opposed to the remote command's own status.
const SSH_CONNECT_STATUS: i32 = 255;

/// Result type alias for remote shell operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by a remote shell
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The channel to the host could not be established
    #[error("connection to {host} failed: {message}")]
    Connect { host: String, message: String },

    /// A remote command exited with a non-zero status
    #[error("remote command `{command}` exited with status {status}")]
    Command { command: String, status: i32 },

    /// The local ssh client could not be spawned
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A command-execution channel to one remote host.
///
/// Scopes must be released in reverse acquisition order; prefer [`scoped`]
/// over calling `enter`/`leave` directly.
pub trait RemoteShell {
    /// Run one command inside the active scopes and return its stdout.
    fn run(&mut self, command: &str) -> RemoteResult<String>;

    /// Issue a scope command and make it part of the context for subsequent
    /// commands. Nothing is pushed when the command fails.
    fn enter(&mut self, command: &str) -> RemoteResult<()>;

    /// Release the innermost scope.
    fn leave(&mut self);
}

/// Run `f` inside the scope opened by `command`, releasing the scope on both
/// the success and the failure path.
pub fn scoped<S, T, F>(shell: &mut S, command: &str, f: F) -> RemoteResult<T>
where
    S: RemoteShell + ?Sized,
    F: FnOnce(&mut S) -> RemoteResult<T>,
{
    shell.enter(command)?;
    let result = f(shell);
    shell.leave();
    result
}

/// Remote shell backed by the system `ssh` client.
///
/// Each issued command is one `ssh <host> <fragment>` child process; the
/// session carries no remote state between invocations, so active scopes are
/// replayed as a prefix of every wire command.
pub struct SshShell {
    /// SSH destination (user@host or host)
    host: String,
    /// Active scope commands, outermost first
    scopes: Vec<String>,
}

impl SshShell {
    /// Create a shell for the given SSH destination
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            scopes: Vec::new(),
        }
    }

    /// Get the SSH destination
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Compose the wire command: active scopes then the logical command,
    /// joined so the remote shell evaluates them left to right and stops at
    /// the first failure.
    fn compose(&self, command: &str) -> String {
        if self.scopes.is_empty() {
            return command.to_string();
        }
        let mut wire = self.scopes.join(" && ");
        wire.push_str(" && ");
        wire.push_str(command);
        wire
    }

    /// Execute one composed command on the host via ssh
    fn exec(&self, command: &str) -> RemoteResult<String> {
        let wire = self.compose(command);

        let output = Command::new("ssh")
            .arg(&self.host)
            .arg(&wire)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let status = output.status.code().unwrap_or(-1);
        if status == SSH_CONNECT_STATUS {
            return Err(RemoteError::Connect {
                host: self.host.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Err(RemoteError::Command {
            command: command.to_string(),
            status,
        })
    }
}

impl RemoteShell for SshShell {
    fn run(&mut self, command: &str) -> RemoteResult<String> {
        self.exec(command)
    }

    fn enter(&mut self, command: &str) -> RemoteResult<()> {
        // Issuing the scope command on its own validates it (a missing
        // directory fails here) before it becomes a prefix.
        self.exec(command)?;
        self.scopes.push(command.to_string());
        Ok(())
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }
}

/// Scriptable remote shell for testing
///
/// Records the logical command trace and fails commands on request. The
/// trace is behind `Arc<Mutex<>>` so clones handed to a runner share it.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingShell {
    trace: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    failures: std::collections::HashMap<String, i32>,
    depth: usize,
    max_depth: usize,
}

#[cfg(test)]
impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` fail with the given exit status
    pub fn fail_on(mut self, command: &str, status: i32) -> Self {
        self.failures.insert(command.to_string(), status);
        self
    }

    /// Commands issued so far, in order
    pub fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }

    /// Number of scopes currently open
    pub fn open_scopes(&self) -> usize {
        self.depth
    }

    /// Deepest scope nesting seen
    pub fn max_scopes(&self) -> usize {
        self.max_depth
    }

    fn record(&mut self, command: &str) -> RemoteResult<()> {
        self.trace.lock().unwrap().push(command.to_string());
        match self.failures.get(command) {
            Some(&status) => Err(RemoteError::Command {
                command: command.to_string(),
                status,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
impl RemoteShell for RecordingShell {
    fn run(&mut self, command: &str) -> RemoteResult<String> {
        self.record(command)?;
        Ok(String::new())
    }

    fn enter(&mut self, command: &str) -> RemoteResult<()> {
        self.record(command)?;
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
