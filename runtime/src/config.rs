//! Startup configuration for the codec and the engine.
//!
//! Everything here is read once, before the first request. Any problem is
//! a `ConfigError` and is fatal.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::codec::{KEY_LEN, Secret};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("encryption key must be exactly 256 bits, got {0} bits")]
    KeySize(usize),
    #[error("encryption key is not valid base64")]
    KeyEncoding,
    #[error("conflicting crypt settings: {0}")]
    Conflict(&'static str),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `[crypt]` section.
///
/// Precedence: `key_base64`, then `key`, then `password`. With none of them
/// a random key is generated and tokens do not survive a restart.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptConfig {
    /// Raw key; its UTF-8 bytes must be exactly 32 long.
    pub key: Option<String>,
    pub key_base64: Option<String>,
    pub password: Option<String>,
    /// Salt for password derivation. Random when omitted.
    pub salt: Option<String>,
    /// Reject tokens older than this.
    pub token_ttl_secs: Option<u64>,
}

impl CryptConfig {
    pub fn secret(&self) -> Result<Secret, ConfigError> {
        if self.key.is_some() && self.key_base64.is_some() {
            return Err(ConfigError::Conflict("`key` and `key_base64` are both set"));
        }

        if let Some(encoded) = &self.key_base64 {
            let key = STANDARD
                .decode(encoded.trim())
                .map_err(|_| ConfigError::KeyEncoding)?;
            return checked_key(key);
        }
        if let Some(key) = &self.key {
            return checked_key(key.as_bytes().to_vec());
        }
        if let Some(password) = &self.password {
            return Ok(Secret::Password {
                password: password.clone(),
                salt: self.salt.as_ref().map(|s| s.as_bytes().to_vec()),
            });
        }
        Ok(Secret::Random)
    }

    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl_secs.map(Duration::from_secs)
    }
}

fn checked_key(key: Vec<u8>) -> Result<Secret, ConfigError> {
    if key.len() != KEY_LEN {
        return Err(ConfigError::KeySize(key.len() * 8));
    }
    Ok(Secret::Key(key))
}

impl std::fmt::Debug for CryptConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("CryptConfig")
            .field("key", &redact(&self.key))
            .field("key_base64", &redact(&self.key_base64))
            .field("password", &redact(&self.password))
            .field("salt", &self.salt)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound for one handler to emit its signal.
    pub step_timeout_ms: u64,
    /// Upper bound on handler invocations within one request.
    pub max_steps: usize,
}

impl EngineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_timeout_ms == 0 {
            return Err(ConfigError::Invalid("engine.step_timeout_ms must be > 0".into()));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("engine.max_steps must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 30_000,
            max_steps: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_must_be_256_bits() {
        let config = CryptConfig {
            key: Some("invalid".into()),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Err(ConfigError::KeySize(56))));

        let config = CryptConfig {
            key: Some("0123456789abcdef0123456789abcdef".into()),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Ok(Secret::Key(k)) if k.len() == 32));
    }

    #[test]
    fn test_base64_key() {
        let config = CryptConfig {
            key_base64: Some(STANDARD.encode([7u8; 32])),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Ok(Secret::Key(_))));

        let config = CryptConfig {
            key_base64: Some("***".into()),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Err(ConfigError::KeyEncoding)));
    }

    #[test]
    fn test_precedence_and_conflicts() {
        let config = CryptConfig {
            key: Some("0123456789abcdef0123456789abcdef".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Ok(Secret::Key(_))));

        let config = CryptConfig {
            key: Some("a".into()),
            key_base64: Some("a".into()),
            ..Default::default()
        };
        assert!(matches!(config.secret(), Err(ConfigError::Conflict(_))));

        assert!(matches!(CryptConfig::default().secret(), Ok(Secret::Random)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = CryptConfig {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let out = format!("{:?}", config);
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_engine_config_from_toml() {
        let config: EngineConfig = toml::from_str("step_timeout_ms = 250").unwrap();
        assert_eq!(config.step_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_steps, 1_000);
        assert!(config.validate().is_ok());

        let config: EngineConfig = toml::from_str("max_steps = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
