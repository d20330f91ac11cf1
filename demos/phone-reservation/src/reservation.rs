//! The `reservation` flow: name, then date, then reason.
//!
//! Each question is an `ORDER` reply; the caller answers by replying with
//! the returned token. Answers already given travel in the token.

use callo::prelude::*;
use chrono::NaiveDate;
use std::time::Duration;

pub const FLOW: &str = "reservation";

/// Simulated latency of persisting a reservation.
pub const STORE_DELAY: Duration = Duration::from_millis(100);

async fn record_name(h: Handle, props: Props, state: State) -> HandlerResult {
    let Some(name) = props.get_str("name") else {
        h.order_replay("SUBMIT_NAME", json!({ "hint": "what is your name?" }));
        return Ok(());
    };
    state.set("name", name);

    if !props.contains("date") {
        h.order("SUBMIT_DATE", json!({ "hint": "when do you want to reserve?" }));
        return Ok(());
    }
    h.next();
    Ok(())
}

async fn when_to_reserve(h: Handle, props: Props, state: State) -> HandlerResult {
    let date = props
        .get_str("date")
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let Some(date) = date else {
        h.order_replay(
            "RESUBMIT_DATE",
            json!({ "hint": "your previously submitted date errs. Submit a new one" }),
        );
        return Ok(());
    };
    state.set("date", date.to_string());

    if !props.contains("reason") {
        h.order("SUBMIT_REASON", json!({ "hint": "why do you want to reserve?" }));
        return Ok(());
    }
    h.next();
    Ok(())
}

async fn why_to_reserve(h: Handle, props: Props, state: State) -> HandlerResult {
    state.set("reason", props.get("reason").cloned().unwrap_or_default());

    // Reply once the store completes; the handler itself returns right away.
    tokio::spawn(async move {
        tokio::time::sleep(STORE_DELAY).await;
        tracing::info!(reservation = %state.to_value(), "Saved reservation");
        h.end(json!({ "hint": "reservation successful." }));
    });
    Ok(())
}

pub fn flow() -> Flow {
    Flow::new()
        .then(handler_fn(record_name))
        .then(handler_fn(when_to_reserve))
        .then(handler_fn(why_to_reserve))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn engine() -> Engine {
        Callo::builder()
            .key([3u8; 32])
            .on(FLOW, flow())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reservation_one_question_at_a_time() {
        let engine = engine();

        let reply = engine.dispatch(Request::dial(FLOW, Map::new())).await;
        assert_eq!(reply.action.as_deref(), Some("SUBMIT_NAME"));

        let reply = engine
            .dispatch(Request::resume(reply.state.unwrap(), props(json!({ "name": "Kim" }))))
            .await;
        assert_eq!(reply.action.as_deref(), Some("SUBMIT_DATE"));

        let reply = engine
            .dispatch(Request::resume(reply.state.unwrap(), props(json!({ "date": "someday" }))))
            .await;
        assert_eq!(reply.action.as_deref(), Some("RESUBMIT_DATE"));

        let reply = engine
            .dispatch(Request::resume(reply.state.unwrap(), props(json!({ "date": "2026-11-02" }))))
            .await;
        assert_eq!(reply.action.as_deref(), Some("SUBMIT_REASON"));

        let reply = engine
            .dispatch(Request::resume(reply.state.unwrap(), props(json!({ "reason": "checkup" }))))
            .await;
        assert_eq!(reply.action, None);
        assert_eq!(reply.data, Some(json!({ "hint": "reservation successful." })));
        assert!(reply.state.is_none());
    }

    #[tokio::test]
    async fn test_everything_at_once() {
        let reply = engine()
            .dispatch(Request::dial(
                FLOW,
                props(json!({ "name": "Kim", "date": "2026-11-02", "reason": "checkup" })),
            ))
            .await;
        assert_eq!(reply.data, Some(json!({ "hint": "reservation successful." })));
    }
}
