//! Caller-side session over HTTP.
//!
//! `CalloSession` holds the last token on behalf of the caller, so a
//! multi-step flow reads as `dial` followed by `reply`s.

use callo_runtime::{Request, Response};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("no open session to reply to")]
    NoSession,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {error}")]
    Rejected { status: u16, error: String },
}

pub struct CalloSession {
    client: reqwest::Client,
    endpoint: String,
    /// Props sent with every call, overridden per call.
    jar: Map<String, Value>,
    token: Option<String>,
    last: Response,
}

impl CalloSession {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            jar: Map::new(),
            token: None,
            last: Response::default(),
        }
    }

    /// Remember `key` for every following call.
    pub fn keep(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.jar.insert(key.into(), value.into());
        self
    }

    /// Start the flow `name`, discarding any open session.
    pub async fn dial(
        &mut self,
        name: &str,
        props: Map<String, Value>,
    ) -> Result<&Response, ClientError> {
        self.clear();
        let request = Request::dial(name, self.merged(props));
        self.send(request).await
    }

    /// Continue the open session.
    pub async fn reply(&mut self, props: Map<String, Value>) -> Result<&Response, ClientError> {
        let token = self.token.clone().ok_or(ClientError::NoSession)?;
        let request = Request::resume(token, self.merged(props));
        self.send(request).await
    }

    pub fn action(&self) -> Option<&str> {
        self.last.action.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.last.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.last.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.last.error.is_some()
    }

    /// Whether a token is held, i.e. `reply` can be called.
    pub fn is_open(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn clear(&mut self) {
        self.token = None;
        self.last = Response::default();
    }

    fn merged(&self, props: Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.jar.clone();
        merged.extend(props);
        merged
    }

    async fn send(&mut self, request: Request) -> Result<&Response, ClientError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        let reply: Response = res.json().await?;
        if !status.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                error: reply.error.unwrap_or_default(),
            });
        }

        // No state means the flow is over (END, UNKNOWN or ERROR).
        self.token = reply.state.clone();
        self.last = reply;
        Ok(&self.last)
    }
}

impl std::fmt::Debug for CalloSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalloSession")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .field("action", &self.last.action)
            .finish()
    }
}
