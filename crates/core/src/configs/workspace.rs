use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::execution::runner::DEFAULT_CONCURRENCY;
use crate::log::LogLevel;
use crate::types::{MonoError, MonoResult};

/// File names looked up at the workspace root, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["monoscript.yml", "monoscript.yaml"];

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    /// The root package. Its location defaults to the workspace directory.
    pub root: Option<PackageConfig>,
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    pub options: Option<OptionsConfig>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageConfig {
    pub name: Option<String>,
    /// Directory relative to the workspace root. Defaults to `packages/<name>`.
    pub location: Option<String>,
    pub version: Option<String>,
    /// Declared dependency names; only names of other workspace packages affect ordering.
    pub dependencies: Option<Vec<String>>,
    pub scripts: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptionsConfig {
    /// Tasks in flight per dependency tier when running batched
    pub concurrency: Option<usize>,
    /// Capture command and script output instead of streaming it
    pub silent: Option<bool>,
    /// Executable used to run package scripts
    pub npm_client: Option<String>,
    pub log_level: Option<LogLevel>,
}

/// Run options with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency: usize,
    pub silent: bool,
    pub npm_client: String,
    pub log_level: LogLevel,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            silent: true,
            npm_client: "npm".to_string(),
            log_level: LogLevel::Info,
        }
    }
}

impl OptionsConfig {
    pub fn resolve(&self) -> MonoResult<RunOptions> {
        let defaults = RunOptions::default();
        let concurrency = self.concurrency.unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(MonoError::Config(
                "options.concurrency must be at least 1".to_string(),
            ));
        }

        Ok(RunOptions {
            concurrency,
            silent: self.silent.unwrap_or(defaults.silent),
            npm_client: self
                .npm_client
                .clone()
                .unwrap_or(defaults.npm_client),
            log_level: self.log_level.unwrap_or(defaults.log_level),
        })
    }
}

impl WorkspaceConfig {
    pub fn run_options(&self) -> MonoResult<RunOptions> {
        match &self.options {
            Some(options) => options.resolve(),
            None => Ok(RunOptions::default()),
        }
    }
}

pub fn parse_workspace_config(yaml_str: &str) -> MonoResult<WorkspaceConfig> {
    let config: WorkspaceConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// JSON schema for `monoscript.yml`
pub fn workspace_config_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(WorkspaceConfig)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packages_and_options() {
        let config = parse_workspace_config(
            r#"
name: shop
packages:
  - name: core
  - name: web
    location: apps/web
    dependencies: [core, react]
    scripts:
      build: vite build
options:
  concurrency: 2
  npmClient: pnpm
  logLevel: warn
"#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("shop"));
        assert_eq!(config.packages.len(), 2);
        let web = &config.packages[1];
        assert_eq!(web.location.as_deref(), Some("apps/web"));
        assert_eq!(
            web.scripts.as_ref().and_then(|s| s.get("build")).map(String::as_str),
            Some("vite build")
        );

        let options = config.run_options().unwrap();
        assert_eq!(
            options,
            RunOptions {
                concurrency: 2,
                silent: true,
                npm_client: "pnpm".to_string(),
                log_level: LogLevel::Warn,
            }
        );
    }

    #[test]
    fn defaults_without_options() {
        let config = parse_workspace_config("packages: []\n").unwrap();
        assert_eq!(config.run_options().unwrap(), RunOptions::default());
        assert_eq!(RunOptions::default().concurrency, 4);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse_workspace_config("pakages: []\n").is_err());
        assert!(parse_workspace_config("packages:\n  - name: a\n    deps: [b]\n").is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = parse_workspace_config("options:\n  concurrency: 0\n").unwrap();
        assert!(matches!(config.run_options(), Err(MonoError::Config(_))));
    }

    #[test]
    fn schema_describes_packages() {
        let schema = workspace_config_schema();
        assert!(schema.to_string().contains("npmClient"));
    }
}
