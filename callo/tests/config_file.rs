use callo::prelude::*;
use callo::{ConfigError, Secret};
use serde_json::Map;
use std::io::Write;

async fn stash(h: Handle, props: Props, state: State) -> HandlerResult {
    if let Some(v) = props.get("v") {
        state.set("v", v.clone());
    }
    h.order("STASHED", ());
    Ok(())
}

async fn reveal(h: Handle, _props: Props, state: State) -> HandlerResult {
    h.end(state.to_value());
    Ok(())
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const CONFIG: &str = r#"
[crypt]
password = "password-for-phone-call"
salt = "fixedsalt"

[engine]
step_timeout_ms = 500
"#;

#[tokio::test]
async fn test_tokens_survive_restart_with_password_and_salt() {
    let file = write_config(CONFIG);
    let config = AppConfig::load(file.path()).unwrap();
    assert!(matches!(config.crypt.secret(), Ok(Secret::Password { .. })));

    let flows = || Flow::new().then(handler_fn(stash)).then(handler_fn(reveal));

    let first = config.builder().on("stash", flows()).build().unwrap();
    let mut props = Map::new();
    props.insert("v".into(), json!(42));
    let token = first
        .dispatch(Request::dial("stash", props))
        .await
        .state
        .unwrap();

    // Same file, fresh process: the derived key must match.
    let restarted = AppConfig::load(file.path())
        .unwrap()
        .builder()
        .on("stash", flows())
        .build()
        .unwrap();
    let reply = restarted
        .dispatch(Request::resume(token, Map::new()))
        .await;
    assert_eq!(reply.data, Some(json!({ "v": 42 })));
}

#[test]
fn test_missing_and_malformed_files() {
    let err = AppConfig::load("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));

    let file = write_config("[engine\nstep_timeout_ms = ");
    assert!(matches!(AppConfig::load(file.path()), Err(ConfigError::Parse(_))));

    let file = write_config("[engine]\nstep_timeout_ms = 0");
    let config = AppConfig::load(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
