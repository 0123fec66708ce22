//! npm script execution inside a package directory
//!
//! [`script`] returns a [`PackageScript`] that runs entries of the package's
//! `scripts` table through a [`ScriptRunner`]. Asking for a script the package
//! does not define is not an error: a warning is logged and the call resolves
//! with an empty string.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::process::Command;

use crate::execution::command::{classify_status, run_teeing, CommandErrorKind};
use crate::log::{ConsoleLogger, Logger};
use crate::package::Package;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to run script '{script}' in {}: {source}", .dir.display())]
    Spawn {
        script: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script '{script}' failed in {}: {kind}\n stdout: {stdout}\n, stderr: {stderr}\n", .dir.display())]
    Failed {
        script: String,
        dir: PathBuf,
        kind: CommandErrorKind,
        stdout: String,
        stderr: String,
    },
}

/// Runs a named package script
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `script` in `dir` and return its captured output
    async fn run_in_dir(&self, script: &str, args: &[String], dir: &Path)
        -> Result<String, ScriptError>;

    /// Run `script` for `package`, streaming output live
    async fn run_streaming(
        &self,
        script: &str,
        args: &[String],
        package: &Package,
    ) -> Result<(), ScriptError>;
}

/// Delegates to `<client> run <script> [args...]`
#[derive(Debug, Clone)]
pub struct NpmScriptRunner {
    npm_client: String,
}

impl NpmScriptRunner {
    pub fn new(npm_client: impl Into<String>) -> Self {
        Self {
            npm_client: npm_client.into(),
        }
    }

    pub fn npm_client(&self) -> &str {
        &self.npm_client
    }

    fn command(&self, script: &str, args: &[String], dir: &Path) -> Command {
        let mut cmd = Command::new(&self.npm_client);
        cmd.arg("run")
            .arg(script)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for NpmScriptRunner {
    fn default() -> Self {
        Self::new("npm")
    }
}

#[async_trait]
impl ScriptRunner for NpmScriptRunner {
    async fn run_in_dir(
        &self,
        script: &str,
        args: &[String],
        dir: &Path,
    ) -> Result<String, ScriptError> {
        let output = self
            .command(script, args, dir)
            .output()
            .await
            .map_err(|source| ScriptError::Spawn {
                script: script.to_string(),
                dir: dir.to_path_buf(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        match classify_status(output.status) {
            None => Ok(stdout),
            Some(kind) => Err(ScriptError::Failed {
                script: script.to_string(),
                dir: dir.to_path_buf(),
                kind,
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
        }
    }

    async fn run_streaming(
        &self,
        script: &str,
        args: &[String],
        package: &Package,
    ) -> Result<(), ScriptError> {
        let dir = package.location();
        let cmd = self.command(script, args, dir);
        let (status, stdout, stderr) = run_teeing(cmd, package.name())
            .await
            .map_err(|source| ScriptError::Spawn {
                script: script.to_string(),
                dir: dir.to_path_buf(),
                source,
            })?;

        match classify_status(status) {
            None => Ok(()),
            Some(kind) => Err(ScriptError::Failed {
                script: script.to_string(),
                dir: dir.to_path_buf(),
                kind,
                stdout,
                stderr,
            }),
        }
    }
}

/// Options for [`script`]
#[derive(Clone)]
pub struct ScriptOptions {
    /// Capture output instead of streaming it
    pub silent: bool,
    pub logger: Arc<dyn Logger>,
    pub runner: Arc<dyn ScriptRunner>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            silent: true,
            logger: Arc::new(ConsoleLogger::default()),
            runner: Arc::new(NpmScriptRunner::default()),
        }
    }
}

/// Script runner bound to one package
#[derive(Clone)]
pub struct PackageScript {
    package: Package,
    silent: bool,
    logger: Arc<dyn Logger>,
    runner: Arc<dyn ScriptRunner>,
}

/// Bind `package` to a script runner
pub fn script(package: &Package, options: ScriptOptions) -> PackageScript {
    PackageScript {
        package: package.clone(),
        silent: options.silent,
        logger: options.logger,
        runner: options.runner,
    }
}

impl PackageScript {
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub async fn run(&self, script: &str) -> Result<String, ScriptError> {
        self.run_with_args(script, &[]).await
    }

    /// Run `script` with extra arguments.
    ///
    /// Resolves with the captured output when silent, and with an empty string
    /// when streaming or when the package has no such script. A script whose
    /// command is empty counts as missing.
    pub async fn run_with_args(&self, script: &str, args: &[String]) -> Result<String, ScriptError> {
        if self.package.script(script).filter(|cmd| !cmd.is_empty()).is_none() {
            self.logger.warn(
                "runNpmScript",
                "script not found",
                Some(&json!({
                    "script": script,
                    "cwd": self.package.location().display().to_string(),
                })),
            );
            return Ok(String::new());
        }

        if self.silent {
            self.runner
                .run_in_dir(script, args, self.package.location())
                .await
        } else {
            self.runner
                .run_streaming(script, args, &self.package)
                .await
                .map(|_| String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, MemoryLogger};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeScripts {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ScriptRunner for FakeScripts {
        async fn run_in_dir(
            &self,
            script: &str,
            args: &[String],
            dir: &Path,
        ) -> Result<String, ScriptError> {
            self.calls.lock().unwrap().push(format!(
                "dir {} {} {}",
                script,
                args.join(" "),
                dir.display()
            ));
            if self.fail {
                return Err(ScriptError::Failed {
                    script: script.to_string(),
                    dir: dir.to_path_buf(),
                    kind: CommandErrorKind::NonZeroExit { code: 1 },
                    stdout: String::new(),
                    stderr: "tsc: error".to_string(),
                });
            }
            Ok(format!("ran {}", script))
        }

        async fn run_streaming(
            &self,
            script: &str,
            _args: &[String],
            package: &Package,
        ) -> Result<(), ScriptError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("stream {} {}", script, package.name()));
            Ok(())
        }
    }

    fn web() -> Package {
        Package::builder("web", "/repo/web")
            .script("build", "tsc")
            .build()
    }

    #[tokio::test]
    async fn missing_script_warns_and_resolves_empty() {
        let runner = Arc::new(FakeScripts::default());
        let logger = MemoryLogger::new();
        let package = Package::new("docs", "/repo/docs");
        let run = script(
            &package,
            ScriptOptions {
                silent: true,
                logger: logger.clone(),
                runner: runner.clone(),
            },
        );

        assert_eq!(run.run("build").await.unwrap(), "");
        assert!(runner.calls.lock().unwrap().is_empty());

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].tag, "runNpmScript");
        assert_eq!(
            entries[0].meta,
            Some(json!({"script": "build", "cwd": "/repo/docs"}))
        );
    }

    #[tokio::test]
    async fn empty_script_command_counts_as_missing() {
        let runner = Arc::new(FakeScripts::default());
        let logger = MemoryLogger::new();
        let package = Package::builder("docs", "/repo/docs")
            .script("build", "")
            .build();
        let run = script(
            &package,
            ScriptOptions {
                silent: true,
                logger: logger.clone(),
                runner: runner.clone(),
            },
        );

        assert_eq!(run.run("build").await.unwrap(), "");
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[tokio::test]
    async fn silent_runs_in_directory_and_captures() {
        let runner = Arc::new(FakeScripts::default());
        let run = script(
            &web(),
            ScriptOptions {
                silent: true,
                logger: MemoryLogger::new(),
                runner: runner.clone(),
            },
        );

        let args = vec!["--watch".to_string()];
        assert_eq!(run.run_with_args("build", &args).await.unwrap(), "ran build");
        assert_eq!(
            runner.calls.lock().unwrap().clone(),
            vec!["dir build --watch /repo/web"]
        );
    }

    #[tokio::test]
    async fn non_silent_streams_without_capture() {
        let runner = Arc::new(FakeScripts::default());
        let run = script(
            &web(),
            ScriptOptions {
                silent: false,
                logger: MemoryLogger::new(),
                runner: runner.clone(),
            },
        );

        assert_eq!(run.run("build").await.unwrap(), "");
        assert_eq!(
            runner.calls.lock().unwrap().clone(),
            vec!["stream build web"]
        );
    }

    #[tokio::test]
    async fn script_failures_propagate() {
        let runner = Arc::new(FakeScripts {
            fail: true,
            ..FakeScripts::default()
        });
        let run = script(
            &web(),
            ScriptOptions {
                silent: true,
                logger: MemoryLogger::new(),
                runner,
            },
        );

        let err = run.run("build").await.unwrap_err();
        assert!(err.to_string().contains("tsc: error"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn npm_runner_invokes_client_with_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = NpmScriptRunner::new("echo");

        let out = runner
            .run_in_dir("build", &["--prod".to_string()], dir.path())
            .await
            .unwrap();
        assert_eq!(out, "run build --prod\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn npm_runner_reports_failing_client() {
        let dir = tempfile::tempdir().unwrap();
        let runner = NpmScriptRunner::new("false");

        let err = runner.run_in_dir("build", &[], dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Failed {
                kind: CommandErrorKind::NonZeroExit { code: 1 },
                ..
            }
        ));
    }

    /// `sh run <script>` executes the `run` file in the package directory
    #[cfg(unix)]
    fn shell_client_dir(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run"), body).unwrap();
        dir
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn npm_runner_streams_invalid_utf8_output() {
        let dir = shell_client_dir("printf 'a\\377b\\n'\n");
        let package = Package::builder("web", dir.path()).script("build", "x").build();
        let runner = NpmScriptRunner::new("sh");

        runner.run_streaming("build", &[], &package).await.unwrap();
        assert_eq!(
            runner.run_in_dir("build", &[], dir.path()).await.unwrap(),
            "a\u{FFFD}b\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn npm_runner_streaming_keeps_output_of_failures() {
        let dir = shell_client_dir("printf 'half'; echo broke >&2; exit 2\n");
        let package = Package::new("web", dir.path());
        let runner = NpmScriptRunner::new("sh");

        let err = runner.run_streaming("build", &[], &package).await.unwrap_err();
        match err {
            ScriptError::Failed {
                kind,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(kind, CommandErrorKind::NonZeroExit { code: 2 });
                assert_eq!(stdout, "half");
                assert_eq!(stderr, "broke\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn npm_runner_reports_missing_client() {
        let dir = tempfile::tempdir().unwrap();
        let runner = NpmScriptRunner::new("monoscript-no-such-npm-client");

        let err = runner.run_in_dir("build", &[], dir.path()).await.unwrap_err();
        assert!(matches!(err, ScriptError::Spawn { .. }));
    }
}
