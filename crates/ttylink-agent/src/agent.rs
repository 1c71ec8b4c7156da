//! Agent runtime
//!
//! The outer loop owns the connect/reconnect state machine; the inner loop
//! is a single `select!` over server messages, terminal output, the
//! keepalive timer and the shutdown signal. Everything runs on one task,
//! so the registry needs no locking.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval};

use ttylink_core::AgentConfig;
use ttylink_protocol::Message;

use crate::link::{ActiveLink, Connector, LinkState, Liveness};
use crate::pty::PtyEvent;
use crate::registry::SessionRegistry;

/// Capacity of the terminal-output channel between reader tasks and the
/// event loop; sends are fire-and-forget from the bridge's point of view
const PTY_EVENT_CHANNEL_CAPACITY: usize = 256;

/// What ended an established connection
#[derive(Debug)]
enum Disconnect {
    /// Transport failure or liveness timeout; reconnect policy applies
    Lost(String),
    /// Non-retryable condition; terminate regardless of reconnect policy
    Fatal(String),
    /// External shutdown request
    Shutdown,
}

/// Outcome of dispatching one decoded server message
#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    Reply(Message),
    Fatal(String),
}

/// Run the agent until shutdown or a fatal condition
pub async fn run(config: AgentConfig, device_id: String, login_program: PathBuf) -> Result<()> {
    let url = config.server_url(&device_id)?;
    let connector = Connector::new(url);

    loop {
        let mut link = match connector.connect().await {
            Ok(link) => link,
            Err(e) => {
                if !config.auto_reconnect {
                    return Err(e);
                }
                tracing::warn!(
                    state = %LinkState::Disconnected,
                    "Connect to {} failed: {:#}. Retrying in {:?}",
                    connector.url(),
                    e,
                    config.reconnect_delay
                );
                if wait_or_shutdown(config.reconnect_delay).await {
                    return Ok(());
                }
                continue;
            }
        };

        // Sessions live only as long as the connection that serves them
        let (pty_tx, mut pty_rx) = mpsc::channel(PTY_EVENT_CHANNEL_CAPACITY);
        let mut registry = SessionRegistry::new(login_program.clone(), pty_tx);
        let mut liveness = Liveness::new(config.keepalive_budget);
        let mut keepalive = keepalive_timer(config.keepalive_interval);

        let disconnect = run_link(
            &mut link,
            &mut registry,
            &mut liveness,
            &mut keepalive,
            &mut pty_rx,
        )
        .await;

        registry.teardown_all().await;

        match disconnect {
            Disconnect::Shutdown => {
                link.close().await;
                return Ok(());
            }
            Disconnect::Fatal(reason) => {
                link.close().await;
                bail!("{}", reason);
            }
            Disconnect::Lost(reason) => {
                drop(link);
                if !config.auto_reconnect {
                    bail!("Connection lost: {}", reason);
                }
                tracing::warn!(
                    state = %LinkState::Disconnected,
                    "Connection lost: {}. Reconnecting in {:?}",
                    reason,
                    config.reconnect_delay
                );
                if wait_or_shutdown(config.reconnect_delay).await {
                    return Ok(());
                }
            }
        }
    }
}

/// Drive one established connection until it ends
async fn run_link(
    link: &mut ActiveLink,
    registry: &mut SessionRegistry,
    liveness: &mut Liveness,
    keepalive: &mut Interval,
    pty_rx: &mut mpsc::Receiver<PtyEvent>,
) -> Disconnect {
    loop {
        tokio::select! {
            message = link.recv() => {
                let Some(message) = message else {
                    return Disconnect::Lost("connection closed".to_string());
                };

                match dispatch(message, registry, liveness).await {
                    Flow::Continue => {}
                    Flow::Reply(reply) => {
                        if link.send(&reply).await.is_err() {
                            return Disconnect::Lost("send failed".to_string());
                        }
                    }
                    Flow::Fatal(reason) => return Disconnect::Fatal(reason),
                }
            }

            event = pty_rx.recv() => {
                // The registry holds a sender, so the channel outlives it
                let Some(event) = event else {
                    return Disconnect::Lost("terminal channel closed".to_string());
                };

                match event {
                    PtyEvent::Output { sid, data } => {
                        if link.send(&Message::data(sid, data)).await.is_err() {
                            return Disconnect::Lost("send failed".to_string());
                        }
                    }
                    PtyEvent::Eof { sid } => {
                        if let Some(logout) = registry.handle_process_exit(&sid).await {
                            if link.send(&logout).await.is_err() {
                                return Disconnect::Lost("send failed".to_string());
                            }
                        }
                    }
                }
            }

            _ = keepalive.tick() => {
                if !liveness.on_tick() {
                    return Disconnect::Lost("keepalive timeout".to_string());
                }
                if link.send(&Message::Ping).await.is_err() {
                    return Disconnect::Lost("send failed".to_string());
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                return Disconnect::Shutdown;
            }
        }
    }
}

/// Act on one decoded server message
pub(crate) async fn dispatch(
    message: Message,
    registry: &mut SessionRegistry,
    liveness: &mut Liveness,
) -> Flow {
    match message {
        Message::Login { sid } => {
            registry.handle_login(sid).await;
            Flow::Continue
        }
        Message::Logout { sid } => {
            registry.handle_logout(&sid).await;
            Flow::Continue
        }
        Message::Data { sid, data } => {
            registry.handle_data(&sid, &data);
            Flow::Continue
        }
        Message::Pong => {
            liveness.on_pong();
            Flow::Continue
        }
        // The protocol sends ping device->server, but answering an
        // unexpected server ping costs nothing
        Message::Ping => Flow::Reply(Message::Pong),
        Message::Add { err: Some(err) } => {
            // Retrying would repeat the same rejection
            Flow::Fatal(format!("Registration rejected by server: {}", err))
        }
        Message::Add { err: None } => {
            tracing::info!("Registered with server");
            Flow::Continue
        }
    }
}

/// Keepalive timer whose first tick fires one full interval after connect
fn keepalive_timer(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile
async fn wait_or_shutdown(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = tokio::signal::ctrl_c() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttylink_protocol::SessionId;

    fn fixtures() -> (SessionRegistry, Liveness, mpsc::Receiver<PtyEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let registry = SessionRegistry::new(PathBuf::from("/bin/sh"), tx);
        (registry, Liveness::new(3), rx)
    }

    #[tokio::test]
    async fn test_pong_resets_liveness() {
        let (mut registry, mut liveness, _rx) = fixtures();
        assert!(liveness.on_tick());
        assert!(liveness.on_tick());

        let flow = dispatch(Message::Pong, &mut registry, &mut liveness).await;
        assert!(matches!(flow, Flow::Continue));

        // Full budget again
        assert!(liveness.on_tick());
        assert!(liveness.on_tick());
        assert!(liveness.on_tick());
        assert!(!liveness.on_tick());
    }

    #[tokio::test]
    async fn test_registration_rejection_is_fatal() {
        let (mut registry, mut liveness, _rx) = fixtures();
        let flow = dispatch(
            Message::Add {
                err: Some("device id taken".to_string()),
            },
            &mut registry,
            &mut liveness,
        )
        .await;
        assert!(matches!(flow, Flow::Fatal(_)));
    }

    #[tokio::test]
    async fn test_registration_success_continues() {
        let (mut registry, mut liveness, _rx) = fixtures();
        let flow = dispatch(Message::Add { err: None }, &mut registry, &mut liveness).await;
        assert!(matches!(flow, Flow::Continue));
    }

    #[tokio::test]
    async fn test_server_ping_answered_with_pong() {
        let (mut registry, mut liveness, _rx) = fixtures();
        let flow = dispatch(Message::Ping, &mut registry, &mut liveness).await;
        assert!(matches!(flow, Flow::Reply(Message::Pong)));
    }

    #[tokio::test]
    async fn test_data_for_unknown_session_is_noop() {
        let (mut registry, mut liveness, _rx) = fixtures();
        let flow = dispatch(
            Message::data(SessionId::new("gone"), &b"ls\n"[..]),
            &mut registry,
            &mut liveness,
        )
        .await;
        assert!(matches!(flow, Flow::Continue));
        assert!(registry.is_empty());
    }
}
