use callo_core::prelude::*;
use callo_http::{CalloSession, ClientError, HttpIngress};
use callo_runtime::Callo;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn require_p1(h: Handle, props: Props, state: State) -> HandlerResult {
    match props.get("p1") {
        None => {
            h.end(json!({ "reason": "NO_P1" }));
        }
        Some(p1) => {
            state.set("s1", p1.clone());
            h.next();
        }
    }
    Ok(())
}

async fn require_p2(h: Handle, props: Props, state: State) -> HandlerResult {
    match props.get("p2") {
        None => {
            h.order("NEED_P2", json!({ "reason": "NO_P2" }));
        }
        Some(p2) => {
            state.set("s2", p2.clone());
            h.next();
        }
    }
    Ok(())
}

async fn take_p2_and_end(h: Handle, props: Props, state: State) -> HandlerResult {
    if !state.contains("s2") {
        if let Some(p2) = props.get("p2") {
            state.set("s2", p2.clone());
        }
    }
    h.end(state.to_value());
    Ok(())
}

async fn fail(_h: Handle, _props: Props, _state: State) -> HandlerResult {
    anyhow::bail!("store offline")
}

struct Server {
    endpoint: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start() -> Server {
    let engine = Callo::builder()
        .password("integration")
        .on(
            "test",
            Flow::new()
                .then(handler_fn(require_p1))
                .then(handler_fn(require_p2))
                .then(handler_fn(take_p2_and_end)),
        )
        .on("fail", handler_fn(fail))
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/rpc", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        HttpIngress::new(engine)
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    Server {
        endpoint,
        shutdown: Some(tx),
    }
}

#[tokio::test]
async fn test_dial_and_reply_over_http() {
    let server = start().await;
    let mut session = CalloSession::new(&server.endpoint);

    let reply = session.dial("test", props(json!({ "p1": "a" }))).await.unwrap();
    assert_eq!(reply.action.as_deref(), Some("NEED_P2"));
    assert!(session.is_open());

    session.reply(props(json!({ "p2": "b" }))).await.unwrap();
    assert_eq!(session.action(), None);
    assert_eq!(session.data(), Some(&json!({ "s1": "a", "s2": "b" })));
    assert!(!session.is_open());

    let err = session.reply(Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::NoSession));
}

#[tokio::test]
async fn test_kept_props_and_unknown_flow() {
    let server = start().await;
    let mut session = CalloSession::new(&server.endpoint);
    session.keep("p1", "kept");

    session.dial("test", Map::new()).await.unwrap();
    session.reply(props(json!({ "p2": "b" }))).await.unwrap();
    assert_eq!(session.data(), Some(&json!({ "s1": "kept", "s2": "b" })));

    assert!(!session.has_error());

    session.dial("nope", Map::new()).await.unwrap();
    assert_eq!(session.action(), Some("UNKNOWN"));
    assert!(!session.is_open());

    session.dial("fail", Map::new()).await.unwrap();
    assert!(session.has_error());
    assert_eq!(session.error(), Some("handler_failed"));
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_raw_http_errors() {
    let server = start().await;
    let client = reqwest::Client::new();

    let res = client.get(&server.endpoint).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    let res = client
        .post(&server.endpoint)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "bad_json" }));

    let res = client
        .post(&server.endpoint)
        .json(&json!({ "state": "forged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "action": "ERROR", "error": "invalid_state" }));
}
