use thiserror::Error;

/// The main error type for monoscript operations
#[derive(Debug, Error)]
pub enum MonoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Circular dependency detected: {}", format_cycles(.0))]
    DependencyCycle(Vec<Vec<String>>),
}

/// Result type alias for monoscript operations
pub type MonoResult<T> = Result<T, MonoError>;

/// Render cycles as `a -> b -> a; c -> c`
pub fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = path.first().cloned() {
                path.push(first);
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
