use std::path::PathBuf;

/// Errors raised while loading or validating the backend configuration.
///
/// Every variant here corresponds to the `configuration` kind in the
/// gateway's error taxonomy: fatal at startup, never surfaced per-call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}
