// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use chrono::{DateTime, Utc};

use crate::devices::{Area, Output, Point};
use crate::error::{ErrorKind, PanelError};

/// All events that can be emitted by the controller.
///
/// Users subscribe via `controller.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PanelEvent>`. Entity payloads are
/// snapshots taken right after the change was applied.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// Configuration finished (`true`) or the connection went away (`false`)
    PanelReady { ready: bool },
    /// Push subscriptions became active or were lost
    ReceivingNotificationsChanged { receiving: bool },
    /// A command, frame or transport failure
    ControllerError { kind: ErrorKind, message: String },
    PointStatusChanged { point: Point },
    AreaReadyChanged { area: Area },
    /// Arming status changed
    AreaOnOffChanged { area: Area },
    AreaAlarmChanged { area: Area },
    OutputStateChanged { output: Output },
    /// Liveness notification from the panel
    ConfidenceHeartbeat { at: DateTime<Utc> },
}

impl PanelEvent {
    pub fn from_error(err: &PanelError) -> Self {
        PanelEvent::ControllerError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
