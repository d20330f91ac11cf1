//! Token inspection for operators

use anyhow::{Context, Result, bail};
use callo::core::SessionState;
use callo::runtime::SessionCodec;
use callo::{AppConfig, Secret};
use std::path::Path;

use crate::check;

pub fn run_open_command(path: &Path, token: &str) -> Result<()> {
    let config = check::load(path, true)?;
    let session = open(&config, token)?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

pub fn open(config: &AppConfig, token: &str) -> Result<SessionState> {
    let secret = config.crypt.secret()?;
    match &secret {
        Secret::Random => bail!("No key configured; tokens cannot be opened outside the issuing process"),
        Secret::Password { salt: None, .. } => {
            bail!("Password without salt; the issuing process used a random salt")
        }
        _ => {}
    }

    let codec = SessionCodec::from_secret(&secret)?.with_ttl(config.crypt.token_ttl());
    codec
        .decrypt(token)
        .context("Token could not be opened with this key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_round_trip() {
        let config =
            AppConfig::from_toml_str("[crypt]\npassword = \"pw\"\nsalt = \"salt\"").unwrap();
        let codec = SessionCodec::from_secret(&config.crypt.secret().unwrap()).unwrap();

        let mut session = SessionState::new();
        session.resume_at = Some(4);
        session.values.insert("name".into(), json!("kim"));
        let token = codec.encrypt(&session).unwrap();

        assert_eq!(open(&config, &token).unwrap(), session);
        assert!(open(&config, "garbage").is_err());
    }

    #[test]
    fn test_unreproducible_keys_are_refused() {
        let config = AppConfig::from_toml_str("[crypt]\npassword = \"pw\"").unwrap();
        assert!(open(&config, "anything").is_err());
        assert!(open(&AppConfig::default(), "anything").is_err());
    }
}
