//! Shell command execution inside a package directory
//!
//! [`command`] binds a package to a [`ProcessRunner`] and returns a
//! [`PackageCommand`] that runs shell strings with the package location as the
//! working directory, resolving with the captured stdout.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::output::prefix_line;
use crate::package::Package;

/// Why a command did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandErrorKind {
    #[error("{message}")]
    Spawn { message: String },

    #[error("Command failed with exit code {code}")]
    NonZeroExit { code: i32 },

    #[error("Command terminated by signal {signal}")]
    Signal { signal: i32 },
}

/// A failed command along with everything it printed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message: '{kind}'\n stdout: {stdout}\n, stderr: {stderr}\n")]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

/// What a [`ProcessRunner`] reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub failure: Option<CommandErrorKind>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a shell command in a directory
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute `command` in the package directory. With `verbose`, output is
    /// echoed live under the package name while still being captured.
    async fn exec(&self, command: &str, package: &Package, verbose: bool) -> ProcessOutput;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellProcessRunner;

impl ShellProcessRunner {
    fn shell(command: &str) -> Command {
        if cfg!(target_family = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn exec(&self, command: &str, package: &Package, verbose: bool) -> ProcessOutput {
        let mut cmd = Self::shell(command);
        cmd.current_dir(package.location())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let result = if verbose {
            run_teeing(cmd, package.name()).await
        } else {
            cmd.output()
                .await
                .map(|out| {
                    (
                        out.status,
                        String::from_utf8_lossy(&out.stdout).into_owned(),
                        String::from_utf8_lossy(&out.stderr).into_owned(),
                    )
                })
        };

        match result {
            Ok((status, stdout, stderr)) => ProcessOutput {
                failure: classify_status(status),
                stdout,
                stderr,
            },
            Err(e) => ProcessOutput {
                failure: Some(CommandErrorKind::Spawn {
                    message: format!("Failed to execute command '{}': {}", command, e),
                }),
                ..ProcessOutput::default()
            },
        }
    }
}

/// Map an exit status to a failure, `None` on success
pub fn classify_status(status: ExitStatus) -> Option<CommandErrorKind> {
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(CommandErrorKind::NonZeroExit { code });
    }
    Some(match terminating_signal(status) {
        Some(signal) => CommandErrorKind::Signal { signal },
        None => CommandErrorKind::NonZeroExit { code: -1 },
    })
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Spawn `cmd` with piped output, echo every line under `label` as it arrives
/// and capture both streams byte for byte
pub(crate) async fn run_teeing(
    mut cmd: Command,
    label: &str,
) -> std::io::Result<(ExitStatus, String, String)> {
    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = tokio::join!(
        tee_lines(stdout, label, false),
        tee_lines(stderr, label, true)
    );
    let status = child.wait().await?;
    Ok((status, stdout?, stderr?))
}

async fn tee_lines<R>(reader: Option<R>, label: &str, to_stderr: bool) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        if reader.read_until(b'\n', &mut chunk).await? == 0 {
            break;
        }
        let shown = echo_line(label, &chunk);
        if to_stderr {
            eprintln!("{}", shown);
        } else {
            println!("{}", shown);
        }
        captured.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}

/// Terminal rendering of one raw output chunk, line ending stripped
fn echo_line(label: &str, chunk: &[u8]) -> String {
    let line = String::from_utf8_lossy(chunk);
    prefix_line(label, line.trim_end_matches(['\n', '\r']))
}

/// Options for [`command`]
#[derive(Clone)]
pub struct CommandOptions {
    /// Capture output without echoing it
    pub silent: bool,
    pub runner: Arc<dyn ProcessRunner>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            silent: true,
            runner: Arc::new(ShellProcessRunner),
        }
    }
}

/// Shell command runner bound to one package
#[derive(Clone)]
pub struct PackageCommand {
    package: Package,
    silent: bool,
    runner: Arc<dyn ProcessRunner>,
}

/// Bind `package` to a command runner
pub fn command(package: &Package, options: CommandOptions) -> PackageCommand {
    PackageCommand {
        package: package.clone(),
        silent: options.silent,
        runner: options.runner,
    }
}

impl PackageCommand {
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Run `command` in the package directory and return its stdout unmodified
    pub async fn run(&self, command: &str) -> Result<String, CommandError> {
        let output = self
            .runner
            .exec(command, &self.package, !self.silent)
            .await;

        match output.failure {
            Some(kind) => Err(CommandError {
                kind,
                command: command.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            None => Ok(output.stdout),
        }
    }
}
