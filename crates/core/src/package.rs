//! Package descriptors
//!
//! A [`Package`] is one member of the workspace as reported by a
//! [`PackageSource`](crate::workspace::PackageSource). Descriptors are built once
//! per run and never mutated afterwards; strategies hand clones to task functions.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One workspace member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    inner: Arc<PackageData>,
}

#[derive(Debug, PartialEq, Eq)]
struct PackageData {
    name: String,
    location: PathBuf,
    version: Option<String>,
    dependencies: Vec<String>,
    scripts: BTreeMap<String, String>,
}

impl Package {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        PackageBuilder::new(name, location).build()
    }

    pub fn builder(name: impl Into<String>, location: impl Into<PathBuf>) -> PackageBuilder {
        PackageBuilder::new(name, location)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Directory the package lives in; commands and scripts run here
    pub fn location(&self) -> &Path {
        &self.inner.location
    }

    pub fn version(&self) -> Option<&str> {
        self.inner.version.as_deref()
    }

    /// All declared dependency names, including ones outside the workspace
    pub fn dependencies(&self) -> &[String] {
        &self.inner.dependencies
    }

    pub fn scripts(&self) -> &BTreeMap<String, String> {
        &self.inner.scripts
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.inner.scripts.get(name).map(String::as_str)
    }

    /// Declared dependencies that name another package in `workspace_names`
    pub fn workspace_dependencies<'a>(
        &'a self,
        workspace_names: &'a HashSet<&'a str>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .dependencies
            .iter()
            .map(String::as_str)
            .filter(move |dep| workspace_names.contains(dep))
    }
}

/// Builder for [`Package`]
#[derive(Debug)]
pub struct PackageBuilder {
    data: PackageData,
}

impl PackageBuilder {
    fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            data: PackageData {
                name: name.into(),
                location: location.into(),
                version: None,
                dependencies: Vec::new(),
                scripts: BTreeMap::new(),
            },
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.data.version = Some(version.into());
        self
    }

    pub fn dependency(mut self, name: impl Into<String>) -> Self {
        self.data.dependencies.push(name.into());
        self
    }

    pub fn dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn script(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.data.scripts.insert(name.into(), command.into());
        self
    }

    pub fn build(self) -> Package {
        Package {
            inner: Arc::new(self.data),
        }
    }
}

/// Names of all packages, for intersecting declared dependencies
pub fn package_names(packages: &[Package]) -> HashSet<&str> {
    packages.iter().map(Package::name).collect()
}
