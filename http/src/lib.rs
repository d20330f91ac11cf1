//! # Callo HTTP
//!
//! Transport adapter for the Callo engine over HTTP/1.1 (hyper 1.0), and a
//! matching client session.
//!
//! ```rust,ignore
//! let engine = Callo::builder().password("secret").on("login", login).build()?;
//! HttpIngress::new(engine).bind("127.0.0.1:3000").run().await?;
//! ```

pub mod body;
pub mod client;
pub mod config;
pub mod ingress;
pub mod service;

pub use body::BodyError;
pub use client::{CalloSession, ClientError};
pub use config::HttpConfig;
pub use ingress::{HttpIngress, IngressError};
pub use service::CalloService;
