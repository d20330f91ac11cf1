use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `[log] filter` is set.
pub const DEFAULT_FILTER: &str = "info,callo_runtime=debug";

#[derive(Error, Debug)]
pub enum ObserveError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives. `RUST_LOG` wins over this when set.
    pub filter: Option<String>,
    pub format: LogFormat,
}

impl LogConfig {
    fn env_filter(&self) -> Result<EnvFilter, ObserveError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directives = self.filter.as_deref().unwrap_or(DEFAULT_FILTER);
        EnvFilter::try_new(directives).map_err(|err| ObserveError::Filter {
            filter: directives.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Install the global subscriber described by `config`.
pub fn init_tracing(config: &LogConfig) -> Result<(), ObserveError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|_| ObserveError::AlreadyInstalled)
}
