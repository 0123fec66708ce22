//! High-level workspace management interface
//!
//! This module provides the [`WorkspaceManager`] which bundles a loaded
//! workspace with its run options, logger and process collaborators. It is the
//! entry point used by the CLI.
//!
//! ## Example
//!
//! ```rust,no_run
//! use monoscript_core::workspace_manager::{Strategy, WorkspaceManager, WorkspaceManagerConfig};
//! use monoscript_core::workspace::PackageFilter;
//! use std::path::PathBuf;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manager = WorkspaceManager::new(WorkspaceManagerConfig {
//!     workspace_root: PathBuf::from("."),
//!     config_file: None,
//!     log_level: None,
//! })?;
//!
//! let packages = manager.select_packages(&PackageFilter::default())?;
//! manager.run_script("build", &[], &packages, Strategy::Batched).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use colored::*;
use serde_json::json;

use crate::configs::RunOptions;
use crate::execution::command::{command, CommandOptions, ProcessRunner, ShellProcessRunner};
use crate::execution::dependencies::{topologically_batch_packages, DependencyGraph};
use crate::execution::runner::{batched_with_concurrency, parallel};
use crate::execution::script::{script, NpmScriptRunner, ScriptOptions, ScriptRunner};
use crate::log::{ConsoleLogger, LogLevel, Logger};
use crate::output::{get_package_color, prefix_line};
use crate::package::{package_names, Package};
use crate::results::{DependencyGraphResult, PackageInfo, PackageListResult};
use crate::types::MonoResult;
use crate::workspace::{ConfigPackageSource, PackageFilter, PackageSource, Workspace};

/// How a command or script is applied across packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Everything at once
    Parallel,
    /// Dependency tiers in order, bounded concurrency inside a tier
    #[default]
    Batched,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => f.write_str("parallel"),
            Self::Batched => f.write_str("batched"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parallel" => Ok(Self::Parallel),
            "batched" => Ok(Self::Batched),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Configuration for initializing a workspace manager
pub struct WorkspaceManagerConfig {
    pub workspace_root: PathBuf,
    /// Explicit config file; otherwise `monoscript.yml` in the workspace root
    pub config_file: Option<PathBuf>,
    /// Overrides the configured log level
    pub log_level: Option<LogLevel>,
}

/// High-level workspace manager that encapsulates all workspace operations
pub struct WorkspaceManager {
    pub workspace: Workspace,
    pub options: RunOptions,
    logger: Arc<dyn Logger>,
    process_runner: Arc<dyn ProcessRunner>,
    script_runner: Arc<dyn ScriptRunner>,
}

impl WorkspaceManager {
    /// Load the workspace described by the config file under `workspace_root`
    pub fn new(config: WorkspaceManagerConfig) -> MonoResult<Self> {
        let source = match &config.config_file {
            Some(path) => ConfigPackageSource::load_file(&config.workspace_root, path)?,
            None => ConfigPackageSource::load(&config.workspace_root)?,
        };

        let mut options = source.config().run_options()?;
        if let Some(level) = config.log_level {
            options.log_level = level;
        }

        let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger::new("monoscript", options.log_level));
        Self::from_source(&source, options, logger)
    }

    /// Build a manager over any package source
    pub fn from_source(
        source: &dyn PackageSource,
        options: RunOptions,
        logger: Arc<dyn Logger>,
    ) -> MonoResult<Self> {
        let workspace = Workspace::load(source, logger.as_ref())?;
        let script_runner = Arc::new(NpmScriptRunner::new(options.npm_client.clone()));

        Ok(Self {
            workspace,
            options,
            logger,
            process_runner: Arc::new(ShellProcessRunner),
            script_runner,
        })
    }

    pub fn with_process_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.process_runner = runner;
        self
    }

    pub fn with_script_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.script_runner = runner;
        self
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    /// List all packages in the workspace
    pub fn list_packages(&self) -> PackageListResult {
        let names = package_names(&self.workspace.packages);
        let info = |package: &Package| {
            let deps = package
                .workspace_dependencies(&names)
                .map(|d| d.to_string())
                .collect();
            PackageInfo::from_package(package, deps)
        };

        PackageListResult {
            root: PackageInfo::from_package(&self.workspace.root, Vec::new()),
            packages: self.workspace.packages.iter().map(info).collect(),
            package_colors: self
                .workspace
                .packages
                .iter()
                .map(|p| (p.name().to_string(), get_package_color(p.name())))
                .collect(),
        }
    }

    /// Get dependency graph information
    pub fn get_dependency_graph(&self) -> MonoResult<DependencyGraphResult> {
        let graph = DependencyGraph::build(&self.workspace.packages)?;
        let tiers = if graph.has_cycles() {
            Vec::new()
        } else {
            topologically_batch_packages(&self.workspace.packages)?
                .iter()
                .map(|tier| tier.iter().map(|p| p.name().to_string()).collect())
                .collect()
        };

        Ok(DependencyGraphResult { graph, tiers })
    }

    pub fn select_packages(&self, filter: &PackageFilter) -> MonoResult<Vec<Package>> {
        filter.apply(&self.workspace.packages)
    }

    /// Run the npm script `script_name` in every package of `packages`
    pub async fn run_script(
        &self,
        script_name: &str,
        args: &[String],
        packages: &[Package],
        strategy: Strategy,
    ) -> anyhow::Result<()> {
        self.logger.verbose(
            "runScript",
            script_name,
            Some(&json!({ "packages": packages.len(), "strategy": strategy.to_string() })),
        );

        let options = ScriptOptions {
            silent: self.options.silent,
            logger: self.logger(),
            runner: Arc::clone(&self.script_runner),
        };
        let script_name = script_name.to_string();
        let args = args.to_vec();

        let task = move |package: Package| {
            let runner = script(&package, options.clone());
            let script_name = script_name.clone();
            let args = args.clone();
            async move {
                let output = runner.run_with_args(&script_name, &args).await?;
                report_completion(&package, &output);
                Ok::<_, anyhow::Error>(())
            }
        };

        self.dispatch(packages, task, strategy).await
    }

    /// Run a shell command in every package of `packages`
    pub async fn exec_command(
        &self,
        shell_command: &str,
        packages: &[Package],
        strategy: Strategy,
    ) -> anyhow::Result<()> {
        self.logger.verbose(
            "execCommand",
            shell_command,
            Some(&json!({ "packages": packages.len(), "strategy": strategy.to_string() })),
        );

        let options = CommandOptions {
            silent: self.options.silent,
            runner: Arc::clone(&self.process_runner),
        };
        let shell_command = shell_command.to_string();

        let task = move |package: Package| {
            let runner = command(&package, options.clone());
            let shell_command = shell_command.clone();
            async move {
                let output = runner.run(&shell_command).await?;
                // verbose runs already echoed their output
                let shown = if runner.is_silent() { output.as_str() } else { "" };
                report_completion(&package, shown);
                Ok::<_, anyhow::Error>(())
            }
        };

        self.dispatch(packages, task, strategy).await
    }

    async fn dispatch<F, Fut>(
        &self,
        packages: &[Package],
        task: F,
        strategy: Strategy,
    ) -> anyhow::Result<()>
    where
        F: Fn(Package) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        match strategy {
            Strategy::Parallel => parallel(packages, task).await.map(|_| ()),
            Strategy::Batched => {
                batched_with_concurrency(packages, task, self.options.concurrency).await
            }
        }
    }
}

/// Print captured output under the package label, then a completion line
fn report_completion(package: &Package, output: &str) {
    for line in output.lines() {
        println!("{}", prefix_line(package.name(), line));
    }
    println!(
        "{} {}",
        "✓".green().bold(),
        format!("Completed for {}", package.name()).color(get_package_color(package.name()))
    );
}
