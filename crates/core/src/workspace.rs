use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::json;

use crate::configs::workspace::{parse_workspace_config, PackageConfig, WorkspaceConfig};
use crate::configs::CONFIG_FILE_NAMES;
use crate::log::Logger;
use crate::package::Package;
use crate::types::{MonoError, MonoResult};

/// Supplies the package set of a workspace
///
/// Discovery lives behind this trait; nothing in the execution layer reads a
/// manifest itself.
pub trait PackageSource {
    /// Workspace packages in a stable order
    fn packages(&self) -> MonoResult<Vec<Package>>;

    fn root_package(&self) -> MonoResult<Package>;
}

/// An in-memory package set
#[derive(Debug, Clone)]
pub struct StaticPackageSource {
    root: Package,
    packages: Vec<Package>,
}

impl StaticPackageSource {
    pub fn new(root: Package, packages: Vec<Package>) -> Self {
        Self { root, packages }
    }
}

impl PackageSource for StaticPackageSource {
    fn packages(&self) -> MonoResult<Vec<Package>> {
        Ok(self.packages.clone())
    }

    fn root_package(&self) -> MonoResult<Package> {
        Ok(self.root.clone())
    }
}

/// Packages declared in a workspace's `monoscript.yml`
#[derive(Debug, Clone)]
pub struct ConfigPackageSource {
    root_dir: PathBuf,
    config: WorkspaceConfig,
}

impl ConfigPackageSource {
    pub fn new(root_dir: impl Into<PathBuf>, config: WorkspaceConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            config,
        }
    }

    /// Read the config file found in `root_dir`
    pub fn load(root_dir: &Path) -> MonoResult<Self> {
        let path = find_config_file(root_dir).ok_or_else(|| {
            MonoError::Config(format!(
                "No {} found in {}",
                CONFIG_FILE_NAMES.join(" or "),
                root_dir.display()
            ))
        })?;
        Self::load_file(root_dir, &path)
    }

    /// Read an explicit config file; package locations resolve against `root_dir`
    pub fn load_file(root_dir: &Path, path: &Path) -> MonoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonoError::Config(format!(
                "Failed to read workspace config {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = parse_workspace_config(&content).map_err(|e| {
            MonoError::Config(format!(
                "Failed to parse workspace config {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self::new(root_dir, config))
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn to_package(&self, config: &PackageConfig, name: String, default_location: &str) -> Package {
        let location = match config.location.as_deref().unwrap_or(default_location) {
            "." => self.root_dir.clone(),
            relative => self.root_dir.join(relative),
        };
        let mut builder = Package::builder(name, location);
        if let Some(version) = &config.version {
            builder = builder.version(version.clone());
        }
        if let Some(dependencies) = &config.dependencies {
            builder = builder.dependencies(dependencies.iter().cloned());
        }
        for (script, command) in config.scripts.iter().flatten() {
            builder = builder.script(script.clone(), command.clone());
        }
        builder.build()
    }
}

impl PackageSource for ConfigPackageSource {
    fn packages(&self) -> MonoResult<Vec<Package>> {
        let mut seen = HashSet::new();
        let mut packages = Vec::with_capacity(self.config.packages.len());

        for (index, package_config) in self.config.packages.iter().enumerate() {
            let name = match package_config.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    return Err(MonoError::Package(format!(
                        "Package #{} has no name",
                        index + 1
                    )))
                }
            };
            if !seen.insert(name.clone()) {
                return Err(MonoError::Package(format!(
                    "Package '{}' is declared more than once",
                    name
                )));
            }

            let default_location = format!("packages/{}", name);
            packages.push(self.to_package(package_config, name, &default_location));
        }

        Ok(packages)
    }

    fn root_package(&self) -> MonoResult<Package> {
        let root_config = self.config.root.clone().unwrap_or_default();
        let name = root_config
            .name
            .clone()
            .or_else(|| self.config.name.clone())
            .or_else(|| {
                self.root_dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| "root".to_string());

        Ok(self.to_package(&root_config, name, "."))
    }
}

/// Return the first config file that exists in `root_dir`
pub fn find_config_file(root_dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| root_dir.join(name))
        .find(|path| path.is_file())
}

/// Fetch the workspace packages from `source`
pub fn load_packages(source: &dyn PackageSource, log: &dyn Logger) -> MonoResult<Vec<Package>> {
    log.verbose("loadPackages", "", None);
    source.packages()
}

/// Fetch the root package from `source`
pub fn load_root_package(source: &dyn PackageSource, log: &dyn Logger) -> MonoResult<Package> {
    let root = source.root_package()?;
    log.verbose(
        "loadRootPackage",
        "",
        Some(&json!({ "cwd": root.location().display().to_string() })),
    );
    Ok(root)
}

/// A loaded workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: Package,
    pub packages: Vec<Package>,
}

impl Workspace {
    pub fn load(source: &dyn PackageSource, log: &dyn Logger) -> MonoResult<Self> {
        Ok(Self {
            root: load_root_package(source, log)?,
            packages: load_packages(source, log)?,
        })
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name() == name)
    }
}

/// Include/exclude globs matched against package names
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl PackageFilter {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Keep packages matching any include (all when none given) and no exclude,
    /// preserving order
    pub fn apply(&self, packages: &[Package]) -> MonoResult<Vec<Package>> {
        if self.is_empty() {
            return Ok(packages.to_vec());
        }

        let include_set = build_glob_set(&self.includes)?;
        let exclude_set = build_glob_set(&self.excludes)?;

        Ok(packages
            .iter()
            .filter(|p| self.includes.is_empty() || include_set.is_match(p.name()))
            .filter(|p| !exclude_set.is_match(p.name()))
            .cloned()
            .collect())
    }
}

fn build_glob_set(patterns: &[String]) -> MonoResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| MonoError::Filter(format!("Invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MonoError::Filter(e.to_string()))
}
