// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, TextKind};
use crate::comm::PanelComm;
use crate::config::{ArmingType, PanelConfig};
use crate::devices::{Area, Output, Point};
use crate::error::{PanelError, Result};
use crate::event::{event_channel, EventReceiver, EventSender, PanelEvent};
use crate::notification::FollowUp;
use crate::session::{shared_state, Capacities, SharedState};
use crate::transport::{stream, Connection, ReaderContext};

/// The main public API for talking to a Mode 2 panel.
///
/// # Example
///
/// ```no_run
/// use bosch_mode2::{Controller, PanelConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = PanelConfig::builder()
///         .host("192.168.1.20")
///         .passcode("0123456789")
///         .build();
///
///     let controller = Controller::new(config);
///     let mut events = controller.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     controller.connect().await?;
///     controller.begin_operation().await?;
///
///     for area in controller.areas().await {
///         println!("Area {}: {} ({:?})", area.number, area.text, area.status);
///     }
///
///     tokio::signal::ctrl_c().await?;
///     controller.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Controller {
    config: PanelConfig,
    state: SharedState,
    event_tx: EventSender,
    /// Serializes whole operations: configuration, poll cycles, control
    /// commands and notification follow-ups.
    gate: Arc<Mutex<()>>,
    link: Mutex<Option<Link>>,
}

/// Everything tied to one live connection.
struct Link {
    connection: Connection,
    comm: PanelComm,
    tasks: Vec<JoinHandle<()>>,
    operating: bool,
}

impl Link {
    async fn shutdown(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connection.shutdown().await;
    }
}

fn step<T>(name: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|source| PanelError::Configuration {
        step: name,
        source: Box::new(source),
    })
}

impl Controller {
    pub fn new(config: PanelConfig) -> Self {
        let (event_tx, _event_rx) = event_channel(config.event_capacity.max(1));
        Self {
            config,
            state: shared_state(),
            event_tx,
            gate: Arc::new(Mutex::new(())),
            link: Mutex::new(None),
        }
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Open the TLS connection and run the configuration sequence.
    pub async fn connect(&self) -> Result<()> {
        self.config.validate()?;
        let stream = stream::open(&self.config).await?;
        self.attach(stream).await
    }

    /// Run the session over an already-established stream.
    ///
    /// Any previous connection is dropped and every table is cleared before
    /// the configuration sequence starts.
    pub async fn attach<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if let Some(old) = self.link.lock().await.take() {
            debug!("Dropping previous connection");
            old.shutdown().await;
        }
        self.state.write().await.reset();

        let (follow_tx, follow_rx) = mpsc::unbounded_channel();
        let connection = Connection::start(
            stream,
            ReaderContext {
                state: self.state.clone(),
                events: self.event_tx.clone(),
                follow_ups: follow_tx,
                idle_timeout: self.config.idle_timeout(),
            },
        );
        let comm = PanelComm::new(
            connection.engine.clone(),
            self.state.clone(),
            self.event_tx.clone(),
        );
        let worker = spawn_follow_up_worker(follow_rx, comm.clone(), self.gate.clone());
        *self.link.lock().await = Some(Link {
            connection,
            comm: comm.clone(),
            tasks: vec![worker],
            operating: false,
        });

        let configured = {
            let _gate = self.gate.lock().await;
            self.configure(&comm).await
        };
        if let Err(e) = configured {
            warn!("Panel configuration failed: {}", e);
            let _ = self.event_tx.send(PanelEvent::from_error(&e));
            if let Some(link) = self.link.lock().await.take() {
                link.shutdown().await;
            }
            self.state.write().await.mark_down();
            return Err(e);
        }

        self.state.write().await.panel_ready = true;
        info!("Panel ready");
        let _ = self.event_tx.send(PanelEvent::PanelReady { ready: true });
        Ok(())
    }

    /// The strict configuration chain; the first failure aborts the rest.
    async fn configure(&self, comm: &PanelComm) -> Result<()> {
        let identity = step("identify", comm.identify(self.config.force_legacy_mode).await)?;
        info!(
            "Connected to {} (protocol {})",
            identity.panel_type.name(),
            identity.protocol_version
        );
        step(
            "authenticate",
            comm.authenticate(&self.config.passcode, self.config.user_type).await,
        )?;
        step("capacities", comm.read_capacities().await)?;
        let firmware = step("firmware", comm.read_firmware(identity.panel_type).await)?;

        let caps = Capabilities::new(
            identity.panel_type,
            identity.protocol_version,
            firmware,
            identity.features,
            self.config.force_legacy_mode,
        );
        self.state.write().await.capabilities = Some(caps);

        step("areas", comm.discover_areas().await)?;
        step("area text", comm.load_text(TextKind::Area).await)?;
        step("outputs", comm.discover_outputs().await)?;
        step("output text", comm.load_text(TextKind::Output).await)?;
        step("points", comm.discover_points().await)?;
        step("point text", comm.load_text(TextKind::Point).await)?;
        Ok(())
    }

    async fn comm(&self) -> Result<PanelComm> {
        match self.link.lock().await.as_ref() {
            Some(link) if link.connection.engine.is_connected() => Ok(link.comm.clone()),
            _ => Err(PanelError::Disconnected),
        }
    }

    /// Seed state with one full poll, then subscribe to push notifications
    /// or fall back to the polling loop.
    ///
    /// Runs once per connection; later calls return `Ok` without touching
    /// the panel.
    pub async fn begin_operation(&self) -> Result<()> {
        if !self.is_ready().await {
            return Err(PanelError::Disconnected);
        }
        let comm = {
            let mut link = self.link.lock().await;
            match link.as_mut() {
                Some(link) if link.connection.engine.is_connected() => {
                    if link.operating {
                        debug!("Operation already started");
                        return Ok(());
                    }
                    link.operating = true;
                    link.comm.clone()
                }
                _ => return Err(PanelError::Disconnected),
            }
        };

        let seeded = {
            let _gate = self.gate.lock().await;
            match poll_cycle(&comm).await {
                Ok(()) => {
                    self.state.write().await.seeded = true;
                    comm.subscribe().await
                }
                Err(e) => Err(e),
            }
        };
        let subscribed = match seeded {
            Ok(subscribed) => subscribed,
            Err(e) => {
                if let Some(link) = self.link.lock().await.as_mut() {
                    link.operating = false;
                }
                return Err(e);
            }
        };

        if !subscribed {
            info!(
                "Polling every {}ms",
                self.config.poll_interval().as_millis()
            );
            let poller = spawn_poll_loop(
                comm,
                self.state.clone(),
                self.gate.clone(),
                self.config.poll_interval(),
            );
            if let Some(link) = self.link.lock().await.as_mut() {
                link.tasks.push(poller);
            }
        }
        Ok(())
    }

    /// Switch an output on or off.
    pub async fn set_output_state(&self, output: u16, on: bool) -> Result<()> {
        let comm = self.comm().await?;
        let _gate = self.gate.lock().await;
        comm.set_output_state(output, on).await
    }

    /// Arm or disarm a set of areas with one command.
    pub async fn arm_areas(&self, areas: &[u16], arming: ArmingType) -> Result<()> {
        let comm = self.comm().await?;
        let _gate = self.gate.lock().await;
        comm.arm_areas(areas, arming).await
    }

    /// Close the session. Termination is best-effort.
    pub async fn disconnect(&self) {
        let Some(link) = self.link.lock().await.take() else {
            return;
        };
        info!("Disconnecting from panel");
        {
            let _gate = self.gate.lock().await;
            if link.connection.engine.is_connected() {
                if let Err(e) = link.comm.terminate().await {
                    debug!("Terminate session failed: {}", e);
                }
            }
        }
        link.shutdown().await;

        let (was_ready, was_receiving) = {
            let mut state = self.state.write().await;
            let flags = (state.panel_ready, state.receiving_notifications);
            state.mark_down();
            flags
        };
        if was_receiving {
            let _ = self
                .event_tx
                .send(PanelEvent::ReceivingNotificationsChanged { receiving: false });
        }
        if was_ready {
            let _ = self.event_tx.send(PanelEvent::PanelReady { ready: false });
        }
    }

    // --- Accessors ---

    pub async fn areas(&self) -> Vec<Area> {
        self.state.read().await.areas.values().cloned().collect()
    }

    pub async fn area(&self, number: u16) -> Option<Area> {
        self.state.read().await.areas.get(&number).cloned()
    }

    pub async fn points(&self) -> Vec<Point> {
        self.state.read().await.points.values().cloned().collect()
    }

    pub async fn point(&self, number: u16) -> Option<Point> {
        self.state.read().await.points.get(&number).cloned()
    }

    pub async fn outputs(&self) -> Vec<Output> {
        self.state.read().await.outputs.values().cloned().collect()
    }

    pub async fn output(&self, number: u16) -> Option<Output> {
        self.state.read().await.outputs.get(&number).cloned()
    }

    pub async fn capabilities(&self) -> Option<Capabilities> {
        self.state.read().await.capabilities.clone()
    }

    pub async fn capacities(&self) -> Capacities {
        self.state.read().await.capacities
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.panel_ready
    }

    pub async fn is_receiving_notifications(&self) -> bool {
        self.state.read().await.receiving_notifications
    }

    pub async fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_heartbeat
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().as_mut() {
            for task in link.tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Points, outputs, areas, then alarm memory.
async fn poll_cycle(comm: &PanelComm) -> Result<()> {
    comm.poll_points().await?;
    comm.poll_outputs().await?;
    comm.poll_areas().await?;
    comm.poll_alarms().await
}

fn spawn_poll_loop(
    comm: PanelComm,
    state: SharedState,
    gate: Arc<Mutex<()>>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let _gate = gate.lock().await;
            {
                let state = state.read().await;
                if state.receiving_notifications || !state.panel_ready {
                    debug!("Poll loop stopping");
                    break;
                }
            }
            if let Err(e) = poll_cycle(&comm).await {
                if e.is_fatal() {
                    warn!("Poll loop stopping: {}", e);
                    break;
                }
                warn!("Poll cycle failed: {}", e);
            }
        }
    })
}

fn spawn_follow_up_worker(
    mut rx: mpsc::UnboundedReceiver<FollowUp>,
    comm: PanelComm,
    gate: Arc<Mutex<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(follow_up) = rx.recv().await {
            let _gate = gate.lock().await;
            let result = match follow_up {
                FollowUp::FetchAlarmDetail { priority } => {
                    comm.refresh_alarm_priority(priority).await
                }
                FollowUp::RefreshOutputs => comm.poll_outputs().await,
            };
            if let Err(e) = result {
                warn!("Follow-up {:?} failed: {}", follow_up, e);
                if e.is_fatal() {
                    break;
                }
            }
        }
    })
}
