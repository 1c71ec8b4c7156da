//! Terminal bridge
//!
//! One spawned shell process and its pseudo-terminal. Bytes flow from the
//! PTY master to the event loop through a channel fed by a blocking reader
//! task; bytes from the server are written straight to the master.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ttylink_protocol::SessionId;

/// Bound on the wait for a killed child; the signal is expected to
/// terminate it immediately
const REAP_TIMEOUT: Duration = Duration::from_millis(500);

/// Event from a bridge's reader task to the event loop
#[derive(Debug)]
pub enum PtyEvent {
    /// Bytes the shell wrote to its terminal
    Output { sid: SessionId, data: Bytes },
    /// The PTY master reached end of stream: the child is gone.
    /// Sent at most once per session, after all of its output.
    Eof { sid: SessionId },
}

/// A shell process bound to a session
pub struct TerminalBridge {
    sid: SessionId,
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    reader_task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl TerminalBridge {
    /// Allocate a PTY, spawn `program` on its slave side and start the
    /// reader task. The process, terminal and stream rise together; they
    /// fall together in [`TerminalBridge::shutdown`].
    pub fn spawn(
        sid: SessionId,
        program: &Path,
        output_tx: mpsc::Sender<PtyEvent>,
    ) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let cmd = CommandBuilder::new(program);
        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {}", program.display()))?;

        tracing::info!(
            "Session {}: spawned {} (pid {:?})",
            sid,
            program.display(),
            child.process_id()
        );

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("Failed to take PTY writer")?;

        // Only the child may keep the slave side open: a slave descriptor
        // held here would stop the master from ever reporting EOF, hiding
        // the child's exit
        let master = pair.master;
        drop(pair.slave);

        let cancel = CancellationToken::new();
        let reader_task = spawn_pty_reader(sid.clone(), reader, output_tx, cancel.clone());

        Ok(Self {
            sid,
            master,
            child,
            writer,
            reader_task,
            cancel,
        })
    }

    /// Write server-supplied bytes to the terminal
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Tear the session down: stop the reader, close the terminal, then
    /// terminate the child and reap it so no zombie is left behind.
    pub async fn shutdown(self) {
        let Self {
            sid,
            master,
            mut child,
            writer,
            reader_task,
            cancel,
        } = self;

        cancel.cancel();
        drop(writer);
        drop(master); // closes the last terminal descriptor we hold

        let _ = child.kill();
        let reap = tokio::task::spawn_blocking(move || {
            let _ = child.wait();
        });
        if tokio::time::timeout(REAP_TIMEOUT, reap).await.is_err() {
            tracing::warn!("Session {}: child did not exit after kill", sid);
        }
        let _ = tokio::time::timeout(REAP_TIMEOUT, reader_task).await;

        tracing::debug!("Session {} torn down", sid);
    }
}

/// Blocking task moving bytes from the PTY master to the event loop.
///
/// Ends on EOF, read error, cancellation, or a closed channel. The final
/// `Eof` event rides the same channel as the output so the event loop sees
/// the last bytes before the exit notification.
fn spawn_pty_reader(
    sid: SessionId,
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<PtyEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];

        loop {
            if cancel.is_cancelled() {
                return;
            }

            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    if tx
                        .blocking_send(PtyEvent::Output {
                            sid: sid.clone(),
                            data,
                        })
                        .is_err()
                    {
                        // Event loop is gone, nothing left to notify
                        return;
                    }
                }
                Err(e) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    // Linux reports EIO on the master once the child exits
                    tracing::debug!("Session {}: PTY read ended: {}", sid, e);
                    break;
                }
            }
        }

        let _ = tx.blocking_send(PtyEvent::Eof { sid });
    })
}
