//! Session registry
//!
//! Owning map from session id to terminal bridge. All mutation happens on
//! the event loop; the registry enforces that a session id maps to at most
//! one live session.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::mpsc;

use ttylink_protocol::{Message, SessionId};

use crate::pty::{PtyEvent, TerminalBridge};

/// Live terminal sessions, keyed by server-assigned session id
pub struct SessionRegistry {
    sessions: HashMap<SessionId, TerminalBridge>,
    /// Program spawned for each session (the system login program)
    login_program: PathBuf,
    /// Cloned into every bridge's reader task
    output_tx: mpsc::Sender<PtyEvent>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(login_program: PathBuf, output_tx: mpsc::Sender<PtyEvent>) -> Self {
        Self {
            sessions: HashMap::new(),
            login_program,
            output_tx,
        }
    }

    /// Open a session for `sid`.
    ///
    /// A login naming an id that is already live replaces the old session:
    /// the previous shell is torn down first so nothing leaks, then a fresh
    /// one is spawned. Spawn failure drops the login; the connection and
    /// other sessions are unaffected.
    pub async fn handle_login(&mut self, sid: SessionId) {
        if let Some(old) = self.sessions.remove(&sid) {
            tracing::warn!("Session {} already open, replacing it", sid);
            old.shutdown().await;
        }

        match TerminalBridge::spawn(sid.clone(), &self.login_program, self.output_tx.clone()) {
            Ok(bridge) => {
                self.sessions.insert(sid, bridge);
            }
            Err(e) => {
                tracing::error!("Failed to open session {}: {:#}", sid, e);
            }
        }
    }

    /// Close the session matching `sid`; quiet when there is none
    pub async fn handle_logout(&mut self, sid: &SessionId) {
        match self.sessions.remove(sid) {
            Some(bridge) => bridge.shutdown().await,
            None => tracing::debug!("Logout for unknown session {}", sid),
        }
    }

    /// Forward server bytes to the session's terminal.
    ///
    /// Bytes for an unknown sid are dropped: the session may have already
    /// ended. A failed write goes to a dead terminal and is not retried.
    pub fn handle_data(&mut self, sid: &SessionId, data: &[u8]) {
        match self.sessions.get_mut(sid) {
            Some(bridge) => {
                if let Err(e) = bridge.write(data) {
                    tracing::error!("Session {}: terminal write failed: {}", sid, e);
                }
            }
            None => tracing::trace!("Data for unknown session {}", sid),
        }
    }

    /// The session's child exited on its own. Tears the session down and
    /// returns the `logout` notification to send upstream; `None` when the
    /// session was already removed (the exit event fires at most once, but
    /// an explicit logout may have raced it).
    pub async fn handle_process_exit(&mut self, sid: &SessionId) -> Option<Message> {
        let bridge = self.sessions.remove(sid)?;
        tracing::info!("Session {}: shell exited", sid);
        bridge.shutdown().await;
        Some(Message::logout(sid.clone()))
    }

    /// Destroy every live session (connection teardown path)
    pub async fn teardown_all(&mut self) {
        for (_, bridge) in self.sessions.drain() {
            bridge.shutdown().await;
        }
    }

    /// Whether `sid` maps to a live session
    pub fn contains(&self, sid: &SessionId) -> bool {
        self.sessions.contains_key(sid)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (SessionRegistry, mpsc::Receiver<PtyEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (SessionRegistry::new(PathBuf::from("/bin/sh"), tx), rx)
    }

    #[tokio::test]
    async fn test_data_for_unknown_session_is_dropped() {
        let (mut registry, _rx) = registry();
        registry.handle_data(&SessionId::new("missing"), b"ls\n");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_logout_for_unknown_session_is_quiet() {
        let (mut registry, _rx) = registry();
        registry.handle_logout(&SessionId::new("missing")).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_process_exit_for_unknown_session_emits_nothing() {
        let (mut registry, _rx) = registry();
        assert!(registry
            .handle_process_exit(&SessionId::new("missing"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_spawn_creates_no_session() {
        let (tx, _rx) = mpsc::channel(256);
        let mut registry = SessionRegistry::new(PathBuf::from("/nonexistent/login"), tx);
        registry.handle_login(SessionId::new("aa")).await;
        assert!(registry.is_empty());
    }
}
