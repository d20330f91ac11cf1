//! # Session Codec
//!
//! Turns a `SessionState` into the opaque token the caller holds, and back.
//!
//! Token layout (base64, standard alphabet):
//!
//! ```text
//! salt (16) ‖ iv (12) ‖ tag (16) ‖ ciphertext
//! ```
//!
//! The process-wide master key never encrypts directly. Each token gets a
//! fresh random salt, and the AES-256-GCM key for that token is derived from
//! the master key with HKDF-SHA256 over that salt. The IV is random as well.
//! The plaintext is canonical JSON (sorted keys) of `{ iat, state }`.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use callo_core::SessionState;
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Master key length: 256 bits.
pub const KEY_LEN: usize = 32;
/// PBKDF2 rounds for password-derived keys.
pub const PBKDF2_ROUNDS: u32 = 10_000;
/// Salt length used when a password salt is generated.
pub const PASSWORD_SALT_LEN: usize = 8;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;
const TOKEN_INFO: &[u8] = b"callo/session-token";

/// A token could not be verified or decoded.
///
/// Deliberately carries no detail: a wrong key, a flipped bit and a
/// truncated blob all look the same to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid session token")]
pub struct TokenError;

/// A session could not be turned into a token.
#[derive(Error, Debug)]
pub enum SealError {
    #[error("failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to encrypt session state")]
    Encrypt,
}

/// Where the master key comes from.
#[derive(Clone)]
pub enum Secret {
    /// Exactly 32 raw bytes.
    Key(Vec<u8>),
    /// PBKDF2-HMAC-SHA512 over the password. A random salt is generated if
    /// none is given, which ties the key to this process.
    Password {
        password: String,
        salt: Option<Vec<u8>>,
    },
    /// Random key for this process only.
    Random,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Key(_) => f.write_str("Secret::Key(<redacted>)"),
            Secret::Password { salt, .. } => f
                .debug_struct("Secret::Password")
                .field("password", &"<redacted>")
                .field("salt", &salt.is_some())
                .finish(),
            Secret::Random => f.write_str("Secret::Random"),
        }
    }
}

/// The 256-bit master key.
#[derive(Clone)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| ConfigError::KeySize(bytes.len() * 8))?;
        Ok(Self(key))
    }

    pub fn from_password(password: &str, salt: Option<&[u8]>) -> Self {
        let generated;
        let salt = match salt {
            Some(salt) => salt,
            None => {
                generated = random_bytes::<PASSWORD_SALT_LEN>();
                &generated[..]
            }
        };
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
        Self(key)
    }

    pub fn random() -> Self {
        Self(random_bytes::<KEY_LEN>())
    }

    pub fn derive(secret: &Secret) -> Result<Self, ConfigError> {
        match secret {
            Secret::Key(bytes) => Self::from_bytes(bytes),
            Secret::Password { password, salt } => {
                Ok(Self::from_password(password, salt.as_deref()))
            }
            Secret::Random => Ok(Self::random()),
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Per-token AES key.
    fn token_cipher(&self, salt: &[u8]) -> Option<Aes256Gcm> {
        let mut okm = [0u8; KEY_LEN];
        Hkdf::<Sha256>::new(Some(salt), &self.0)
            .expand(TOKEN_INFO, &mut okm)
            .ok()?;
        Aes256Gcm::new_from_slice(&okm).ok()
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Issued-at, unix seconds.
    iat: i64,
    state: SessionState,
}

/// Authenticated encryption of session state into tokens.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    key: SessionKey,
    ttl: Option<Duration>,
}

impl SessionCodec {
    pub fn new(key: SessionKey) -> Self {
        Self { key, ttl: None }
    }

    /// Reject tokens issued more than `ttl` ago.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn from_secret(secret: &Secret) -> Result<Self, ConfigError> {
        SessionKey::derive(secret).map(Self::new)
    }

    pub fn encrypt(&self, state: &SessionState) -> Result<String, SealError> {
        let envelope = Envelope {
            iat: chrono::Utc::now().timestamp(),
            state: state.clone(),
        };
        let mut buffer = serde_json::to_vec(&envelope)?;

        let salt = random_bytes::<SALT_LEN>();
        let iv = random_bytes::<IV_LEN>();
        let cipher = self.key.token_cipher(&salt).ok_or(SealError::Encrypt)?;
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| SealError::Encrypt)?;

        let mut token = Vec::with_capacity(HEADER_LEN + buffer.len());
        token.extend_from_slice(&salt);
        token.extend_from_slice(&iv);
        token.extend_from_slice(&tag);
        token.extend_from_slice(&buffer);
        Ok(STANDARD.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> Result<SessionState, TokenError> {
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|_| reject("malformed base64"))?;
        if raw.len() < HEADER_LEN {
            return Err(reject("truncated token"));
        }

        let (salt, rest) = raw.split_at(SALT_LEN);
        let (iv, rest) = rest.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let cipher = self
            .key
            .token_cipher(salt)
            .ok_or_else(|| reject("key derivation failed"))?;
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer, Tag::from_slice(tag))
            .map_err(|_| reject("authentication failed"))?;

        let envelope: Envelope =
            serde_json::from_slice(&buffer).map_err(|_| reject("malformed payload"))?;

        if let Some(ttl) = self.ttl {
            let age = chrono::Utc::now().timestamp() - envelope.iat;
            if age < 0 || age as u64 > ttl.as_secs() {
                return Err(reject("token expired"));
            }
        }

        Ok(envelope.state)
    }
}

/// Log the concrete cause for operators, surface nothing to callers.
fn reject(reason: &'static str) -> TokenError {
    tracing::debug!(reason, "Rejected session token");
    TokenError
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}
