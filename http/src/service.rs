//! # CalloService - Hyper Service Adapter
//!
//! Adapts one HTTP exchange to one engine dispatch:
//! decode the body, hand `{ name, props, state }` to the engine, encode the
//! reply. Status is 200 for every reply the engine produced, including
//! `ERROR` replies; 4xx is reserved for bodies the engine never saw.

use bytes::Bytes;
use callo_runtime::Engine;
use http::header::{ALLOW, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Body, Incoming};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::Instrument;

use crate::body::{ReplyEncoding, decode_request, error_reply, json_reply};
use crate::config::HttpConfig;

#[derive(Clone)]
pub struct CalloService {
    engine: Engine,
    config: Arc<HttpConfig>,
}

impl CalloService {
    pub fn new(engine: Engine, config: HttpConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Serve one request. Generic over the body so it can be driven without
    /// a socket.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let span = tracing::info_span!(
            "HTTPRequest",
            callo.http.method = %req.method(),
            callo.http.path = %req.uri().path()
        );

        async move {
            if req.method() != Method::POST {
                let mut res = error_reply(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed");
                res.headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("POST"));
                return res;
            }

            let (parts, body) = req.into_parts();
            let encoding = ReplyEncoding::for_request(self.config.compress, &parts.headers);

            let request = match decode_request(&parts.headers, body, self.config.max_body_bytes).await {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(error = %err, "Rejected request body");
                    return error_reply(err.status(), err.code());
                }
            };

            let reply = self.engine.dispatch(request).await;
            json_reply(StatusCode::OK, &reply, encoding)
        }
        .instrument(span)
        .await
    }
}

impl hyper::service::Service<Request<Incoming>> for CalloService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callo_core::prelude::*;
    use callo_runtime::Callo;
    use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, VARY};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    async fn echo(h: Handle, props: Props, _state: State) -> HandlerResult {
        h.end(props.to_value());
        Ok(())
    }

    fn service(config: HttpConfig) -> CalloService {
        let engine = Callo::builder()
            .key([1u8; 32])
            .on("echo", handler_fn(echo))
            .build()
            .unwrap();
        CalloService::new(engine, config)
    }

    fn post(body: Value) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(Bytes::from(body.to_string())));
        *req.method_mut() = Method::POST;
        req
    }

    async fn json_body(res: Response<Full<Bytes>>) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_dispatches_to_engine() {
        let svc = service(HttpConfig::default());
        let res = svc
            .handle(post(json!({ "name": "echo", "props": { "a": 1 } })))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[VARY], "accept-encoding");
        assert_eq!(json_body(res).await, json!({ "data": { "a": 1 } }));
    }

    #[tokio::test]
    async fn test_non_post_is_405() {
        let svc = service(HttpConfig::default());
        let res = svc.handle(Request::new(Full::new(Bytes::new()))).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_bad_body_never_reaches_engine() {
        let svc = service(HttpConfig {
            max_body_bytes: 16,
            ..Default::default()
        });
        let res = svc
            .handle(post(json!({ "name": "echo", "props": { "long": "x".repeat(64) } })))
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(res).await, json!({ "error": "body_too_large" }));

        let svc = service(HttpConfig::default());
        let mut req = Request::new(Full::new(Bytes::from_static(b"[1, 2")));
        *req.method_mut() = Method::POST;
        let res = svc.handle(req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reply_compression_follows_config() {
        let big = json!({ "name": "echo", "props": { "blob": "y".repeat(4096) } });

        let mut req = post(big.clone());
        req.headers_mut()
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        let res = service(HttpConfig::default()).handle(req).await;
        assert_eq!(res.headers()[CONTENT_ENCODING], "gzip");

        let mut req = post(big);
        req.headers_mut()
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        let res = service(HttpConfig {
            compress: false,
            ..Default::default()
        })
        .handle(req)
        .await;
        assert!(res.headers().get(CONTENT_ENCODING).is_none());
    }
}
