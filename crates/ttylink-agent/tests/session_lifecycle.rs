//! Session lifecycle tests against real pseudo-terminals.
//!
//! These exercise the registry and terminal bridge with actual spawned
//! processes; the relay connection is not involved.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use ttylink_agent::pty::PtyEvent;
use ttylink_agent::registry::SessionRegistry;
use ttylink_protocol::{codec, Message, SessionId};

const WAIT: Duration = Duration::from_secs(10);

fn sid() -> SessionId {
    SessionId::new("a".repeat(32))
}

fn registry_for(program: &str) -> (SessionRegistry, mpsc::Receiver<PtyEvent>) {
    let (tx, rx) = mpsc::channel(256);
    (SessionRegistry::new(PathBuf::from(program), tx), rx)
}

async fn next_event(rx: &mut mpsc::Receiver<PtyEvent>) -> PtyEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for PTY event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_login_spawns_one_session() {
    let (mut registry, _rx) = registry_for("/bin/sh");

    registry.handle_login(sid()).await;
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(&sid()));

    registry.teardown_all().await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_login_then_logout_leaves_no_entry() {
    let (mut registry, _rx) = registry_for("/bin/sh");

    registry.handle_login(sid()).await;
    registry.handle_logout(&sid()).await;

    assert!(!registry.contains(&sid()));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_duplicate_login_replaces_session() {
    let (mut registry, _rx) = registry_for("/bin/cat");

    registry.handle_login(sid()).await;
    registry.handle_login(sid()).await;
    assert_eq!(registry.len(), 1);

    registry.teardown_all().await;
}

#[tokio::test]
async fn test_server_data_reaches_terminal_and_comes_back() {
    let (mut registry, mut rx) = registry_for("/bin/cat");
    registry.handle_login(sid()).await;

    // Decoded server frame: base64 "aGVsbG8K" is "hello\n"
    let frame = format!(r#"{{"type":"data","sid":"{}","data":"aGVsbG8K"}}"#, sid());
    match codec::decode(&frame).unwrap().unwrap() {
        Message::Data { sid, data } => registry.handle_data(&sid, &data),
        other => panic!("unexpected message {:?}", other),
    }

    // cat (plus the tty echo) writes the bytes back to the master, tagged
    // with the session id
    let mut seen = Vec::new();
    loop {
        match next_event(&mut rx).await {
            PtyEvent::Output { sid: s, data } => {
                assert_eq!(s, sid());
                seen.extend_from_slice(&data);
                if String::from_utf8_lossy(&seen).contains("hello") {
                    break;
                }
            }
            PtyEvent::Eof { .. } => panic!("terminal closed before echoing"),
        }
    }

    registry.teardown_all().await;
}

#[tokio::test]
async fn test_shell_exit_emits_logout() {
    let (mut registry, mut rx) = registry_for("/bin/sh");
    registry.handle_login(sid()).await;
    registry.handle_data(&sid(), b"exit\n");

    // Drain shell output until the exit notification arrives
    loop {
        match next_event(&mut rx).await {
            PtyEvent::Output { .. } => continue,
            PtyEvent::Eof { sid: s } => {
                assert_eq!(s, sid());
                break;
            }
        }
    }

    let logout = registry
        .handle_process_exit(&sid())
        .await
        .expect("exit should produce a logout");
    assert_eq!(logout, Message::logout(sid()));
    assert_eq!(
        codec::encode(&logout).unwrap(),
        format!(r#"{{"type":"logout","sid":"{}"}}"#, sid())
    );
    assert!(registry.is_empty());

    // The exit is observed exactly once
    assert!(registry.handle_process_exit(&sid()).await.is_none());
}
