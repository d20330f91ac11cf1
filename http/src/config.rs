use serde::{Deserialize, Serialize};

/// Default bind address for the ingress.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
/// Default request body limit, after decompression.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub bind: String,
    /// Gzip replies for clients that accept it.
    pub compress: bool,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            compress: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
