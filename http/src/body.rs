//! Request body decoding and reply encoding.
//!
//! Everything that can go wrong here is a `BodyError`. The engine is never
//! invoked for a body that fails to decode.

use bytes::Bytes;
use callo_runtime::{Request, Response};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, VARY};
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use std::io::{Read, Write};
use thiserror::Error;

/// Replies smaller than this are sent uncompressed.
pub const MIN_COMPRESS_BYTES: usize = 1024;

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("failed to decompress request body: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("failed to read request body: {0}")]
    Read(String),
    #[error("malformed request body: {0}")]
    Json(#[from] serde_json::Error),
}

impl BodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::UnsupportedEncoding(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BodyError::Decompress(_) | BodyError::Read(_) | BodyError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable code for the `error` field of the reply.
    pub fn code(&self) -> &'static str {
        match self {
            BodyError::TooLarge(_) => "body_too_large",
            BodyError::UnsupportedEncoding(_) => "unsupported_encoding",
            BodyError::Decompress(_) => "bad_compression",
            BodyError::Read(_) => "bad_body",
            BodyError::Json(_) => "bad_json",
        }
    }
}

/// Collect at most `limit` bytes of `body`.
pub async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes, BodyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyError::TooLarge(limit))
        }
        Err(err) => Err(BodyError::Read(err.to_string())),
    }
}

/// Undo `Content-Encoding`. The inflated size is bounded by `limit` too.
pub fn inflate(headers: &HeaderMap, raw: Bytes, limit: usize) -> Result<Bytes, BodyError> {
    let encoding = match headers.get(CONTENT_ENCODING) {
        Some(value) => value
            .to_str()
            .map_err(|_| {
                BodyError::UnsupportedEncoding(String::from_utf8_lossy(value.as_bytes()).into_owned())
            })?
            .trim()
            .to_ascii_lowercase(),
        None => String::new(),
    };

    match encoding.as_str() {
        "" | "identity" => Ok(raw),
        "gzip" | "x-gzip" => read_bounded(GzDecoder::new(&raw[..]), limit),
        "deflate" => read_bounded(ZlibDecoder::new(&raw[..]), limit),
        other => Err(BodyError::UnsupportedEncoding(other.to_string())),
    }
}

fn read_bounded(reader: impl Read, limit: usize) -> Result<Bytes, BodyError> {
    let mut out = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(BodyError::Decompress)?;
    if out.len() > limit {
        return Err(BodyError::TooLarge(limit));
    }
    Ok(Bytes::from(out))
}

/// Read, inflate and parse `{ name, props, state }`.
pub async fn decode_request<B>(
    headers: &HeaderMap,
    body: B,
    limit: usize,
) -> Result<Request, BodyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw = collect_limited(body, limit).await?;
    let bytes = inflate(headers, raw, limit)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Whether the client listed gzip in `Accept-Encoding` with a non-zero q.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|item| {
            let mut parts = item.split(';').map(str::trim);
            let coding = parts.next().unwrap_or_default();
            let rejected = parts.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            });
            (coding.eq_ignore_ascii_case("gzip") || coding == "*") && !rejected
        })
}

/// How an engine reply may be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyEncoding {
    /// Compression is off for this ingress.
    Identity,
    /// Compression is on. The body is gzipped only if the client accepts it.
    Negotiated { client_accepts_gzip: bool },
}

impl ReplyEncoding {
    pub fn for_request(compress: bool, headers: &HeaderMap) -> Self {
        if compress {
            ReplyEncoding::Negotiated {
                client_accepts_gzip: accepts_gzip(headers),
            }
        } else {
            ReplyEncoding::Identity
        }
    }
}

/// JSON reply with the given status. Under `Negotiated`, every reply carries
/// `Vary: accept-encoding` and large payloads are gzipped for clients that
/// accept it.
pub fn json_reply<T: serde::Serialize>(
    status: StatusCode,
    body: &T,
    encoding: ReplyEncoding,
) -> http::Response<Full<Bytes>> {
    let json = match serde_json::to_vec(body) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize reply");
            return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "internal");
        }
    };

    let gzip = matches!(
        encoding,
        ReplyEncoding::Negotiated {
            client_accepts_gzip: true
        }
    );
    let compressed = if gzip && json.len() >= MIN_COMPRESS_BYTES {
        gzip_bytes(&json)
    } else {
        None
    };

    let mut res = match compressed {
        Some(bytes) => {
            let mut res = http::Response::new(Full::new(Bytes::from(bytes)));
            res.headers_mut()
                .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            res
        }
        None => http::Response::new(Full::new(Bytes::from(json))),
    };
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if matches!(encoding, ReplyEncoding::Negotiated { .. }) {
        res.headers_mut()
            .insert(VARY, HeaderValue::from_static("accept-encoding"));
    }
    res
}

/// `{ "error": code }` with the given status.
pub fn error_reply(status: StatusCode, code: &str) -> http::Response<Full<Bytes>> {
    let body = Response {
        error: Some(code.to_string()),
        ..Default::default()
    };
    let json = serde_json::to_vec(&body).unwrap_or_default();
    let mut res = http::Response::new(Full::new(Bytes::from(json)));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

fn gzip_bytes(input: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(input.len() / 2), Compression::default());
    encoder.write_all(input).ok()?;
    match encoder.finish() {
        Ok(out) => Some(out),
        Err(err) => {
            tracing::warn!(error = %err, "Reply compression failed; sending uncompressed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use serde_json::json;

    fn gzip(data: &[u8]) -> Bytes {
        Bytes::from(gzip_bytes(data).unwrap())
    }

    fn headers(pairs: &[(http::header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[tokio::test]
    async fn test_decode_plain_and_compressed() {
        let payload = br#"{"name":"test","props":{"p1":"a"}}"#;

        let req = decode_request(&HeaderMap::new(), Full::new(Bytes::from_static(payload)), 1024)
            .await
            .unwrap();
        assert_eq!(req.name.as_deref(), Some("test"));

        let h = headers(&[(CONTENT_ENCODING, "gzip")]);
        let req = decode_request(&h, Full::new(gzip(payload)), 1024).await.unwrap();
        assert_eq!(req.props.unwrap().get("p1"), Some(&json!("a")));

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(payload).unwrap();
        let h = headers(&[(CONTENT_ENCODING, "deflate")]);
        let req = decode_request(&h, Full::new(Bytes::from(zlib.finish().unwrap())), 1024)
            .await
            .unwrap();
        assert_eq!(req.name.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_decode_errors() {
        let err = decode_request(&HeaderMap::new(), Full::new(Bytes::from_static(b"{nope")), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_json");

        let err = decode_request(&HeaderMap::new(), Full::new(Bytes::from(vec![b' '; 2048])), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::TooLarge(1024)));

        let h = headers(&[(CONTENT_ENCODING, "gzip")]);
        let err = decode_request(&h, Full::new(Bytes::from_static(b"not gzip")), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_compression");

        let h = headers(&[(CONTENT_ENCODING, "br")]);
        let err = decode_request(&h, Full::new(Bytes::from_static(b"{}")), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_inflated_size_is_bounded() {
        let bomb = gzip(&vec![b' '; 64 * 1024]);
        let h = headers(&[(CONTENT_ENCODING, "gzip")]);
        let err = decode_request(&h, Full::new(bomb), 1024).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge(1024)));
    }

    #[test]
    fn test_accepts_gzip() {
        assert!(accepts_gzip(&headers(&[(ACCEPT_ENCODING, "gzip, deflate, br")])));
        assert!(accepts_gzip(&headers(&[(ACCEPT_ENCODING, "br;q=1.0, GZIP;q=0.5")])));
        assert!(accepts_gzip(&headers(&[(ACCEPT_ENCODING, "*")])));
        assert!(!accepts_gzip(&headers(&[(ACCEPT_ENCODING, "gzip;q=0")])));
        assert!(!accepts_gzip(&headers(&[(ACCEPT_ENCODING, "br")])));
        assert!(!accepts_gzip(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn test_json_reply_compression_threshold() {
        let gzip = ReplyEncoding::Negotiated {
            client_accepts_gzip: true,
        };
        let small = json_reply(StatusCode::OK, &json!({ "data": "x" }), gzip);
        assert!(small.headers().get(CONTENT_ENCODING).is_none());

        let large_body = json!({ "data": "x".repeat(4096) });
        let large = json_reply(StatusCode::OK, &large_body, gzip);
        assert_eq!(large.headers()[CONTENT_ENCODING], "gzip");

        let bytes = large.into_body().collect().await.unwrap().to_bytes();
        let inflated = read_bounded(GzDecoder::new(&bytes[..]), 1 << 20).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&inflated).unwrap();
        assert_eq!(value, large_body);
    }

    #[test]
    fn test_vary_follows_compression_setting() {
        let large_body = json!({ "data": "x".repeat(4096) });

        let plain_client = ReplyEncoding::for_request(true, &HeaderMap::new());
        let res = json_reply(StatusCode::OK, &large_body, plain_client);
        assert!(res.headers().get(CONTENT_ENCODING).is_none());
        assert_eq!(res.headers()[VARY], "accept-encoding");

        let gzip_client = headers(&[(ACCEPT_ENCODING, "gzip")]);
        let res = json_reply(StatusCode::OK, &large_body, ReplyEncoding::for_request(false, &gzip_client));
        assert!(res.headers().get(CONTENT_ENCODING).is_none());
        assert!(res.headers().get(VARY).is_none());
    }

    #[tokio::test]
    async fn test_non_ascii_encoding_is_unsupported() {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_ENCODING, HeaderValue::from_bytes(b"gz\xffip").unwrap());
        let err = decode_request(&h, Full::new(Bytes::from_static(b"{}")), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::UnsupportedEncoding(_)));
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
