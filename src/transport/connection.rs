// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::constants::{TAG_NOTIFICATION, TAG_SYNC};
use crate::error::PanelError;
use crate::event::{EventSender, PanelEvent};
use crate::notification::{self, FollowUp};
use crate::session::SharedState;
use crate::transport::command::CommandEngine;

/// One live session stream: the command engine for the write side and the
/// reader task that owns the read side.
pub struct Connection {
    pub engine: Arc<CommandEngine>,
    reader_handle: Option<JoinHandle<()>>,
}

/// What the reader task needs besides the stream.
pub struct ReaderContext {
    pub state: SharedState,
    pub events: EventSender,
    pub follow_ups: mpsc::UnboundedSender<FollowUp>,
    pub idle_timeout: Duration,
}

impl Connection {
    /// Split `stream`, wrap the write half in a [`CommandEngine`], and spawn
    /// the reader task on the read half.
    pub fn start<S>(stream: S, ctx: ReaderContext) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let engine = Arc::new(CommandEngine::new(Box::new(writer), ctx.idle_timeout));
        let reader_handle = spawn_reader_task(reader, engine.clone(), ctx);
        Self {
            engine,
            reader_handle: Some(reader_handle),
        }
    }

    /// Close the engine and stop the reader without raising transport errors.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        self.engine.close().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
    }
}

/// Outcome of trying to cut one frame off the front of the read buffer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Split {
    Frame(Vec<u8>),
    Incomplete,
    BadTag(u8),
}

/// Cut the next complete frame using its tag and declared length.
pub(crate) fn next_frame(buf: &mut Vec<u8>) -> Split {
    let Some(&tag) = buf.first() else {
        return Split::Incomplete;
    };
    let total = match tag {
        TAG_SYNC => match buf.get(1) {
            Some(len) => usize::from(*len) + 2,
            None => return Split::Incomplete,
        },
        TAG_NOTIFICATION => match (buf.get(1), buf.get(2)) {
            (Some(hi), Some(lo)) => usize::from(u16::from_be_bytes([*hi, *lo])) + 3,
            _ => return Split::Incomplete,
        },
        other => {
            buf.clear();
            return Split::BadTag(other);
        }
    };
    if buf.len() < total {
        return Split::Incomplete;
    }
    Split::Frame(buf.drain(..total).collect())
}

fn spawn_reader_task<R>(
    mut reader: R,
    engine: Arc<CommandEngine>,
    ctx: ReaderContext,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        let mut pending = Vec::new();
        let mut stalled = engine.stalled();

        let failure = loop {
            let read = tokio::select! {
                _ = stalled.changed() => {
                    let command = (*stalled.borrow()).unwrap_or("command");
                    break PanelError::CommandTimeout { command };
                }
                read = timeout(ctx.idle_timeout, reader.read(&mut buf)) => read,
            };
            match read {
                Err(_) => {
                    break PanelError::IdleTimeout {
                        secs: ctx.idle_timeout.as_secs(),
                    }
                }
                Ok(Ok(0)) => {
                    debug!("Reader: connection closed by panel");
                    break PanelError::Disconnected;
                }
                Ok(Ok(n)) => {
                    pending.extend_from_slice(&buf[..n]);
                    loop {
                        match next_frame(&mut pending) {
                            Split::Frame(frame) => dispatch(frame, &engine, &ctx).await,
                            Split::Incomplete => break,
                            Split::BadTag(tag) => {
                                let err = PanelError::InvalidProtocol { tag };
                                warn!("Reader: {}", err);
                                let _ = ctx.events.send(PanelEvent::from_error(&err));
                                break;
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    error!("Reader: read error: {}", e);
                    break PanelError::Io(e);
                }
            }
        };

        teardown(failure, &engine, &ctx).await;
    })
}

async fn dispatch(frame: Vec<u8>, engine: &CommandEngine, ctx: &ReaderContext) {
    if frame[0] == TAG_SYNC {
        engine.complete(frame).await;
        return;
    }

    let decoded = match notification::decode(&frame) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Dropping notification: {}", e);
            let _ = ctx.events.send(PanelEvent::from_error(&e));
            return;
        }
    };

    let projection = {
        let mut state = ctx.state.write().await;
        notification::apply(&mut state, &decoded)
    };
    for event in projection.events {
        let _ = ctx.events.send(event);
    }
    for follow_up in projection.follow_ups {
        if ctx.follow_ups.send(follow_up).is_err() {
            debug!("Follow-up worker gone, dropping {:?}", follow_up);
        }
    }
}

async fn teardown(failure: PanelError, engine: &CommandEngine, ctx: &ReaderContext) {
    info!("Connection lost: {}", failure);
    let (was_ready, was_receiving) = {
        let mut state = ctx.state.write().await;
        let flags = (state.panel_ready, state.receiving_notifications);
        state.mark_down();
        flags
    };
    engine.close().await;

    let _ = ctx.events.send(PanelEvent::from_error(&failure));
    if was_receiving {
        let _ = ctx
            .events
            .send(PanelEvent::ReceivingNotificationsChanged { receiving: false });
    }
    if was_ready {
        let _ = ctx.events.send(PanelEvent::PanelReady { ready: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::event_channel;
    use crate::session::shared_state;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_next_frame_splits_by_length() {
        let mut buf = vec![0x01, 0x01, 0xFC, 0x02, 0x00, 0x02, 0x00, 0x00, 0x01];
        assert_eq!(next_frame(&mut buf), Split::Frame(vec![0x01, 0x01, 0xFC]));
        assert_eq!(
            next_frame(&mut buf),
            Split::Frame(vec![0x02, 0x00, 0x02, 0x00, 0x00])
        );
        assert_eq!(next_frame(&mut buf), Split::Incomplete);
        assert_eq!(buf, vec![0x01]);
    }

    #[test]
    fn test_next_frame_bad_tag_discards() {
        let mut buf = vec![0x07, 0x01, 0x02];
        assert_eq!(next_frame(&mut buf), Split::BadTag(0x07));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_idle_timeout_tears_down() {
        let (client, _panel) = tokio::io::duplex(256);
        let state = shared_state();
        state.write().await.panel_ready = true;
        let (events, mut rx) = event_channel(16);
        let (follow_ups, _follow_rx) = mpsc::unbounded_channel();
        let conn = Connection::start(
            client,
            ReaderContext {
                state: state.clone(),
                events,
                follow_ups,
                idle_timeout: Duration::from_millis(30),
            },
        );

        match rx.recv().await.unwrap() {
            PanelEvent::ControllerError { kind, .. } => assert_eq!(kind, ErrorKind::Transport),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), PanelEvent::PanelReady { ready: false }));
        assert!(!state.read().await.panel_ready);
        assert!(!conn.engine.is_connected());
    }

    #[tokio::test]
    async fn test_reply_timeout_tears_down_live_session() {
        let (client, panel) = tokio::io::duplex(256);
        let (mut panel_rx, mut panel_tx) = tokio::io::split(panel);
        let state = shared_state();
        state.write().await.panel_ready = true;
        let (events, mut rx) = event_channel(64);
        let (follow_ups, _follow_rx) = mpsc::unbounded_channel();
        let conn = Connection::start(
            client,
            ReaderContext {
                state: state.clone(),
                events,
                follow_ups,
                idle_timeout: Duration::from_millis(200),
            },
        );

        // Heartbeats keep the idle timer from firing; the reply only shows up
        // once the next command is on the wire.
        let panel_task = tokio::spawn(async move {
            let mut request = [0u8; 3];
            panel_rx.read_exact(&mut request).await.unwrap();
            for _ in 0..8 {
                if panel_tx.write_all(&[0x02, 0x00, 0x02, 0x00, 0x00]).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let _ = panel_rx.read(&mut request).await;
            let _ = panel_tx.write_all(&[0x01, 0x05, 0xFE, 0x00, 0x03, 0x00, 0x07]).await;
        });

        assert!(matches!(
            conn.engine.send(&crate::protocol::Command::FirmwareVersion).await,
            Err(PanelError::CommandTimeout { command: "FirmwareVersion" })
        ));

        let mut saw_transport_error = false;
        loop {
            match rx.recv().await.unwrap() {
                PanelEvent::ControllerError { kind, .. } => {
                    assert_eq!(kind, ErrorKind::Transport);
                    saw_transport_error = true;
                }
                PanelEvent::PanelReady { ready: false } => break,
                PanelEvent::ConfidenceHeartbeat { .. } => {}
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(saw_transport_error);
        assert!(!state.read().await.panel_ready);
        assert!(!conn.engine.is_connected());
        assert!(matches!(
            conn.engine.send(&crate::protocol::Command::TerminateSession).await,
            Err(PanelError::Disconnected)
        ));
        panel_task.abort();
    }

    #[tokio::test]
    async fn test_unknown_tag_raises_invalid_protocol() {
        let (client, mut panel) = tokio::io::duplex(256);
        let (events, mut rx) = event_channel(16);
        let (follow_ups, _follow_rx) = mpsc::unbounded_channel();
        let _conn = Connection::start(
            client,
            ReaderContext {
                state: shared_state(),
                events,
                follow_ups,
                idle_timeout: Duration::from_secs(5),
            },
        );
        panel.write_all(&[0x09, 0x00]).await.unwrap();
        match rx.recv().await.unwrap() {
            PanelEvent::ControllerError { kind, .. } => {
                assert_eq!(kind, ErrorKind::InvalidProtocol)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
