//! File-based application configuration.
//!
//! ```toml
//! [crypt]
//! password = "password-for-phone-call"
//! token_ttl_secs = 3600
//!
//! [engine]
//! step_timeout_ms = 30000
//!
//! [http]
//! bind = "0.0.0.0:8000"
//! compress = true
//!
//! [log]
//! format = "json"
//! ```
//!
//! Environment overrides, applied after the file: `CALLO_PASSWORD`,
//! `CALLO_KEY` (base64) and `CALLO_BIND`.

use callo_http::{HttpConfig, HttpIngress};
use callo_observe::LogConfig;
use callo_runtime::{Callo, CalloBuilder, ConfigError, CryptConfig, Engine, EngineConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const ENV_PASSWORD: &str = "CALLO_PASSWORD";
pub const ENV_KEY: &str = "CALLO_KEY";
pub const ENV_BIND: &str = "CALLO_BIND";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub crypt: CryptConfig,
    pub engine: EngineConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse `path`. Environment overrides are not applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// `load` followed by the process environment overrides and validation.
    pub fn load_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.crypt.password = Some(password);
        }
        if let Some(key) = lookup(ENV_KEY) {
            self.crypt.key = None;
            self.crypt.key_base64 = Some(key);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.http.bind = bind;
        }
    }

    /// Everything that would otherwise fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.crypt.secret()?;
        self.http
            .bind
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid(format!("http.bind {:?}: {}", self.http.bind, err)))?;
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("http.max_body_bytes must be > 0".into()));
        }
        Ok(())
    }

    /// A builder preloaded with the crypt and engine sections.
    pub fn builder(&self) -> CalloBuilder {
        Callo::builder()
            .crypt_config(self.crypt.clone())
            .engine_config(self.engine.clone())
    }

    /// An ingress for `engine` using the http section.
    pub fn ingress(&self, engine: Engine) -> HttpIngress {
        HttpIngress::new(engine).config(self.http.clone())
    }
}
