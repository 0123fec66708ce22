//! monoscript Core Library
//!
//! Scripting helpers for monorepos: load the packages of a workspace, apply a
//! task to them sequentially, in parallel or in dependency order, and run shell
//! commands or npm scripts inside each package.
//!
//! ## Architecture
//!
//! - [`package`] - Package descriptors
//! - [`workspace`] - Package sources, workspace loading and name filtering
//! - [`execution`] - Iteration strategies, topological batching and executors
//! - [`workspace_manager`] - High-level interface used by the CLI
//! - [`configs`] - `monoscript.yml` parsing
//! - [`log`] - Leveled logging sinks
//! - [`results`] - Result types for workspace queries
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! The two halves compose: an iteration strategy drives a task built from a
//! per-package executor.
//!
//! ```rust,no_run
//! use monoscript_core::exec::{self, ScriptOptions};
//! use monoscript_core::iter;
//! use monoscript_core::Package;
//!
//! # async fn example(packages: Vec<Package>) -> anyhow::Result<()> {
//! iter::batched(&packages, |package| async move {
//!     exec::script(&package, ScriptOptions::default()).run("build").await?;
//!     anyhow::Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod configs;
pub mod execution;
pub mod log;
pub mod output;
pub mod package;
pub mod results;
pub mod types;
pub mod workspace;
pub mod workspace_manager;

/// Iteration strategies over a package set
pub mod iter {
    pub use crate::execution::runner::{
        batched, batched_with_concurrency, for_each, parallel, DEFAULT_CONCURRENCY,
    };
}

/// Per-package executors
pub mod exec {
    pub use crate::execution::command::{
        command, CommandError, CommandErrorKind, CommandOptions, PackageCommand, ProcessOutput,
        ProcessRunner, ShellProcessRunner,
    };
    pub use crate::execution::script::{
        script, NpmScriptRunner, PackageScript, ScriptError, ScriptOptions, ScriptRunner,
    };
}

// Re-export the main types for easier usage
pub use package::Package;
pub use types::{MonoError, MonoResult};
pub use workspace::{load_packages, load_root_package, PackageSource, Workspace};
pub use workspace_manager::{WorkspaceManager, WorkspaceManagerConfig};
