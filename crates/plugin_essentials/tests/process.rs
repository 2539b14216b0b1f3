//! Runs the built plugin binary behind a real `PluginHost`.

use plugin_essentials::{SayPayload, SystemMessage};
use plugin_system::{HostOptions, PluginHost, PluginSpec};
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use world_event_system::{event_types, ActorKind, Event};

const PLUGIN_BIN: &str = env!("CARGO_BIN_EXE_plugin_essentials");

fn host() -> PluginHost {
    PluginHost::new(HostOptions {
        event_timeout: Duration::from_secs(10),
        handshake_timeout: Duration::from_secs(10),
    })
}

fn say(message: &str) -> Event {
    Event::new(
        "location:lobby",
        event_types::SAY,
        ActorKind::Character,
        "c1",
        json!({ "message": message }).to_string(),
    )
}

/// Launches the binary directly with the given environment changes and
/// returns its exit code and stdout.
async fn run_without_host(env: &[(&str, Option<&str>)]) -> (Option<i32>, Vec<u8>) {
    let mut command = Command::new(PLUGIN_BIN);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    for (key, value) in env {
        match value {
            Some(value) => command.env(key, value),
            None => command.env_remove(key),
        };
    }

    let output = tokio::time::timeout(Duration::from_secs(10), command.output())
        .await
        .expect("plugin did not exit")
        .unwrap();
    (output.status.code(), output.stdout)
}

#[tokio::test]
async fn test_loaded_binary_echoes_say() {
    let host = host();
    host.load(&PluginSpec::new("essentials", PLUGIN_BIN))
        .await
        .unwrap();
    assert_eq!(host.plugins(), ["essentials"]);

    for message in ["hello", "again"] {
        let emits = host.deliver_event("essentials", say(message)).await.unwrap();
        assert_eq!(emits.len(), 1);
        assert_eq!(emits[0].stream, "location:lobby");
        assert_eq!(emits[0].event_type, "say");
        let payload: SayPayload = serde_json::from_str(&emits[0].payload).unwrap();
        assert_eq!(payload.message, format!("Echo: {message}"));
    }

    host.close().await;
    assert!(host.plugins().is_empty());
}

#[tokio::test]
async fn test_loaded_binary_answers_set_command() {
    let host = host();
    host.load(&PluginSpec::new("essentials", PLUGIN_BIN))
        .await
        .unwrap();

    let command = Event::new(
        "location:lobby",
        event_types::COMMAND,
        ActorKind::Character,
        "c7",
        json!({ "name": "set", "args": "object desc=A brass key" }).to_string(),
    );
    let emits = host.deliver_event("essentials", command).await.unwrap();
    assert_eq!(emits.len(), 1);
    assert_eq!(emits[0].stream, "character:c7");
    let reply: SystemMessage = serde_json::from_str(&emits[0].payload).unwrap();
    assert_eq!(reply.message, "Set description on object to: A brass key");

    host.unload("essentials").await.unwrap();
    assert!(!host.is_loaded("essentials"));
    host.close().await;
}

#[tokio::test]
async fn test_binary_without_cookie_exits_before_handshake() {
    let (code, stdout) = run_without_host(&[
        ("WORLDHOST_PLUGIN", None),
        ("PLUGIN_PROTOCOL_VERSIONS", Some("1")),
    ])
    .await;

    assert_eq!(code, Some(1));
    assert!(stdout.is_empty(), "unexpected stdout: {:?}", String::from_utf8_lossy(&stdout));
}

#[tokio::test]
async fn test_binary_with_unsupported_version_exits_before_handshake() {
    let (code, stdout) = run_without_host(&[
        ("WORLDHOST_PLUGIN", Some("worldhost-v1")),
        ("PLUGIN_PROTOCOL_VERSIONS", Some("7")),
    ])
    .await;

    assert_eq!(code, Some(1));
    assert!(stdout.is_empty(), "unexpected stdout: {:?}", String::from_utf8_lossy(&stdout));
}
