//! Startup registration phase.
//!
//! `CalloBuilder` is the only place flows can be added. Building consumes
//! it, so the table is frozen before the engine serves its first request.

use callo_core::{Flow, FlowTable, IntoChain, NamedFlow, RegistrationError};
use thiserror::Error;

use crate::codec::{Secret, SessionCodec};
use crate::config::{ConfigError, CryptConfig, EngineConfig};
use crate::engine::Engine;

/// Everything that can stop a server from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Entry point.
///
/// ```rust,ignore
/// let engine = Callo::builder()
///     .password("my-password")
///     .pre(handler_fn(audit))
///     .on("login", Flow::new().then(handler_fn(check_password)).then(handler_fn(issue)))
///     .build()?;
/// ```
pub struct Callo;

impl Callo {
    pub fn builder() -> CalloBuilder {
        CalloBuilder::new()
    }
}

pub struct CalloBuilder {
    table: FlowTable,
    middleware: Flow,
    pending: Vec<NamedFlow>,
    crypt: CryptConfig,
    secret: Option<Secret>,
    engine: EngineConfig,
}

impl Default for CalloBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CalloBuilder {
    pub fn new() -> Self {
        Self {
            table: FlowTable::new(),
            middleware: Flow::new(),
            pending: Vec::new(),
            crypt: CryptConfig::default(),
            secret: None,
            engine: EngineConfig::default(),
        }
    }

    /// Middleware prepended to every flow committed after this call.
    pub fn pre(mut self, step: impl IntoChain) -> Self {
        self.middleware = self.middleware.then(step);
        self
    }

    /// Declare the flow `name`.
    pub fn on(mut self, name: impl Into<String>, chain: impl IntoChain) -> Self {
        self.pending.push(NamedFlow::new(name).then(chain));
        self
    }

    /// Declare an already named flow.
    pub fn flow(mut self, flow: NamedFlow) -> Self {
        self.pending.push(flow);
        self
    }

    /// Register every pending flow, prefixed with the current middleware.
    pub fn commit(mut self) -> Result<Self, RegistrationError> {
        for flow in std::mem::take(&mut self.pending) {
            let flow = if self.middleware.is_empty() {
                flow
            } else {
                flow.pre(&self.middleware)
            };
            self.table.register(flow)?;
        }
        Ok(self)
    }

    /// Explicit 256-bit key.
    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(Secret::Key(key.into()));
        self
    }

    /// Password-derived key with a random salt.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.secret = Some(Secret::Password {
            password: password.into(),
            salt: None,
        });
        self
    }

    pub fn secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Crypt settings from configuration. An explicit `key`/`password`/
    /// `secret` call takes precedence over the config's key material.
    pub fn crypt_config(mut self, crypt: CryptConfig) -> Self {
        self.crypt = crypt;
        self
    }

    pub fn engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn step_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.engine.step_timeout_ms =
            u64::try_from(timeout.as_millis().max(1)).unwrap_or(u64::MAX);
        self
    }

    /// Commit pending flows, derive the key and freeze everything.
    pub fn build(self) -> Result<Engine, StartupError> {
        let mut builder = self.commit()?;
        builder.engine.validate()?;

        let secret = match builder.secret.take() {
            Some(secret) => secret,
            None => builder.crypt.secret()?,
        };
        if matches!(secret, Secret::Random) {
            tracing::warn!("No key or password configured; tokens will not survive a restart");
        }
        let codec = SessionCodec::from_secret(&secret)?.with_ttl(builder.crypt.token_ttl());

        tracing::info!(
            flows = builder.table.entries().count(),
            slots = builder.table.len(),
            "Flow table frozen"
        );
        Ok(Engine::new(builder.table, codec, builder.engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callo_core::prelude::*;
    use serde_json::json;

    async fn stamp(h: Handle, _props: Props, state: State) -> HandlerResult {
        state.set("stamped", true);
        h.next();
        Ok(())
    }

    async fn finish(h: Handle, _props: Props, state: State) -> HandlerResult {
        h.end(state.to_value());
        Ok(())
    }

    #[test]
    fn test_step_timeout_saturates() {
        let builder = Callo::builder().step_timeout(std::time::Duration::MAX);
        assert_eq!(builder.engine.step_timeout_ms, u64::MAX);

        let builder = Callo::builder().step_timeout(std::time::Duration::ZERO);
        assert_eq!(builder.engine.step_timeout_ms, 1);
    }

    #[test]
    fn test_duplicate_flow_is_fatal() {
        let result = Callo::builder()
            .on("a", handler_fn(finish))
            .on("a", handler_fn(finish))
            .build();
        assert!(matches!(
            result,
            Err(StartupError::Registration(RegistrationError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_bad_key_is_fatal() {
        let result = Callo::builder()
            .key("invalid")
            .on("a", handler_fn(finish))
            .build();
        assert!(matches!(result, Err(StartupError::Config(ConfigError::KeySize(_)))));
    }

    #[test]
    fn test_middleware_only_applies_to_later_commits() {
        let engine = Callo::builder()
            .on("plain", handler_fn(finish))
            .commit()
            .unwrap()
            .pre(handler_fn(stamp))
            .on("stamped", handler_fn(finish))
            .build()
            .unwrap();

        let table = engine.table();
        assert_eq!(table.start_offset("plain"), Some(0));
        assert_eq!(table.start_offset("stamped"), Some(2));
        // plain: [finish, None], stamped: [stamp, finish, None]
        assert_eq!(table.len(), 5);
    }

    #[tokio::test]
    async fn test_middleware_runs_first() {
        let engine = Callo::builder()
            .pre(handler_fn(stamp))
            .on("test", handler_fn(finish))
            .build()
            .unwrap();

        let reply = engine
            .dispatch(crate::message::Request::dial("test", Default::default()))
            .await;
        assert_eq!(reply.data, Some(json!({ "stamped": true })));
        assert!(reply.state.is_none());
    }
}
