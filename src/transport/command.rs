// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};

use crate::error::{PanelError, Result};
use crate::protocol::{Command, Reply};

/// Write half of whatever stream carries the session.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Single-in-flight command/reply exchange.
///
/// Replies carry no request identifier, so at most one command may be on the
/// wire at a time. `exchange` is held from the write until the reply (or a
/// failure) arrives; the reader task hands the reply frame over through the
/// one pending oneshot slot.
///
/// A missed reply leaves the stream position unknown, so a timeout closes the
/// engine and publishes the command name on `stalled` for the reader to tear
/// the session down.
pub struct CommandEngine {
    exchange: Mutex<()>,
    pending: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
    writer: Mutex<BoxedWriter>,
    connected: AtomicBool,
    reply_timeout: Duration,
    stalled: watch::Sender<Option<&'static str>>,
}

impl CommandEngine {
    pub fn new(writer: BoxedWriter, reply_timeout: Duration) -> Self {
        Self {
            exchange: Mutex::new(()),
            pending: Mutex::new(None),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
            reply_timeout,
            stalled: watch::Sender::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Changes to the name of the command whose reply timed out.
    pub fn stalled(&self) -> watch::Receiver<Option<&'static str>> {
        self.stalled.subscribe()
    }

    /// Encode `command`, write it, and wait for the matching reply frame.
    ///
    /// Only tag/length validation happens here; the caller interprets the
    /// status byte.
    pub async fn send(&self, command: &Command) -> Result<Reply> {
        let frame = command.encode()?;
        let _exchange = self.exchange.lock().await;

        if !self.is_connected() {
            return Err(PanelError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);

        debug!("Sending {} ({} bytes)", command.name(), frame.len());
        {
            let mut writer = self.writer.lock().await;
            let written = async {
                writer.write_all(&frame).await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = written {
                error!("Failed to write {}: {}", command.name(), e);
                self.pending.lock().await.take();
                return Err(PanelError::Io(e));
            }
        }

        match timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => {
                debug!("Reply to {}: {:02X?}", command.name(), reply);
                Reply::parse(&reply)
            }
            // Sender dropped: the reader closed the engine.
            Ok(Err(_)) => Err(PanelError::Disconnected),
            Err(_) => {
                warn!("No reply to {} within {:?}", command.name(), self.reply_timeout);
                self.close().await;
                self.stalled.send_replace(Some(command.name()));
                Err(PanelError::CommandTimeout {
                    command: command.name(),
                })
            }
        }
    }

    /// Route a synchronous-tag frame to the waiting command.
    pub async fn complete(&self, frame: Vec<u8>) {
        match self.pending.lock().await.take() {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    debug!("Reply arrived after its command gave up");
                }
            }
            None => warn!("Discarding reply with no command waiting: {:02X?}", frame),
        }
    }

    /// Mark the engine closed and fail any waiting command.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.take();
        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!("Writer shutdown: {}", e);
        }
    }
}
