//! Result types for workspace operations
//!
//! Output structures returned by [`WorkspaceManager`](crate::WorkspaceManager)
//! queries, kept free of presentation so the CLI decides how to print them.

use std::collections::HashMap;
use std::path::PathBuf;

use colored::Color;

use crate::execution::dependencies::DependencyGraph;
use crate::package::Package;

/// Information about one package
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    pub location: PathBuf,
    pub version: Option<String>,
    /// Dependencies on other workspace packages only
    pub workspace_dependencies: Vec<String>,
    pub scripts: Vec<String>,
}

/// Result of listing packages in the workspace
#[derive(Debug)]
pub struct PackageListResult {
    pub root: PackageInfo,
    pub packages: Vec<PackageInfo>,
    pub package_colors: HashMap<String, Color>,
}

/// Result of getting the dependency graph
#[derive(Debug)]
pub struct DependencyGraphResult {
    pub graph: DependencyGraph,
    /// Batched execution order; empty when the graph has cycles
    pub tiers: Vec<Vec<String>>,
}

impl PackageInfo {
    pub fn from_package(package: &Package, workspace_dependencies: Vec<String>) -> Self {
        Self {
            name: package.name().to_string(),
            location: package.location().to_path_buf(),
            version: package.version().map(|v| v.to_string()),
            workspace_dependencies,
            scripts: package.scripts().keys().cloned().collect(),
        }
    }
}
