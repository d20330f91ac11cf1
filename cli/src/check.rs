//! Config validation

use anyhow::{Context, Result};
use callo::{AppConfig, Secret};
use std::path::Path;

/// Validate the config at `path`, printing a short report.
pub fn run_check_command(path: &Path, use_env: bool) -> Result<()> {
    println!("Checking Callo config at: {}", path.display());

    let config = load(path, use_env)?;
    for line in report(&config)? {
        println!("  {}", line);
    }

    println!();
    println!("✅ Config OK");
    Ok(())
}

pub fn load(path: &Path, use_env: bool) -> Result<AppConfig> {
    let mut config =
        AppConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
    if use_env {
        config.apply_env(|name| std::env::var(name).ok());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn report(config: &AppConfig) -> Result<Vec<String>> {
    let key = match config.crypt.secret()? {
        Secret::Key(_) => "✅ explicit 256-bit key".to_string(),
        Secret::Password { salt: Some(_), .. } => "✅ password-derived key (fixed salt)".to_string(),
        Secret::Password { salt: None, .. } => {
            "⚠️  password without salt: tokens will not survive a restart".to_string()
        }
        Secret::Random => "⚠️  no key configured: tokens will not survive a restart".to_string(),
    };

    let ttl = match config.crypt.token_ttl_secs {
        Some(secs) => format!("token ttl: {}s", secs),
        None => "token ttl: none".to_string(),
    };

    Ok(vec![
        key,
        ttl,
        format!(
            "engine: step timeout {}ms, max {} steps",
            config.engine.step_timeout_ms, config.engine.max_steps
        ),
        format!(
            "http: bind {}, compress {}, max body {} bytes",
            config.http.bind, config.http.compress, config.http.max_body_bytes
        ),
    ])
}
