//! Task execution module
//!
//! Iteration strategies over a package set, topological batching, and the
//! per-package command and script executors.

pub mod command;
pub mod dependencies;
pub mod runner;
pub mod script;

pub use command::{command, CommandError, CommandErrorKind, CommandOptions, PackageCommand};
pub use dependencies::{topologically_batch_packages, DependencyGraph};
pub use runner::{batched, batched_with_concurrency, for_each, parallel, DEFAULT_CONCURRENCY};
pub use script::{script, PackageScript, ScriptError, ScriptOptions};
