//! Configuration parsing
//!
//! A workspace is described by a `monoscript.yml` (or `monoscript.yaml`) file at
//! its root, listing the packages and the default run options.

pub mod workspace;

pub use workspace::{
    parse_workspace_config, workspace_config_schema, OptionsConfig, PackageConfig, RunOptions,
    WorkspaceConfig, CONFIG_FILE_NAMES,
};
