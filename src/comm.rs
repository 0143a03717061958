// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capabilities::{
    auth_dialect, output_dialect, subscription_dialect, text_dialect, AuthDialect, Capabilities,
    FeatureMask, PanelType, TextDialect, TextKind,
};
use crate::config::{ArmingType, UserType};
use crate::constants::{
    ALARM_DETAIL_MORE, ALARM_PRIORITY_COUNT, AREA_STATUS_BATCH, MAX_ALARM_PAGES, MAX_AREAS,
    MAX_OUTPUTS, MAX_POINTS, MAX_TEXT_PAGES, POINT_STATUS_BATCH,
};
use crate::devices::{Area, AreaStatus, Output, Point, PointStatus};
use crate::error::{PanelError, Result};
use crate::event::{EventSender, PanelEvent};
use crate::protocol::{
    decode_bitmask, encode_bitmask, parse_status_triples, parse_text_page, read_nul_text,
    AlarmRecord, Command, ReadyType, Reply,
};
use crate::session::{Capacities, SharedState};
use crate::transport::command::CommandEngine;
use crate::version::{FirmwareVersion, ProtocolVersion};

/// What the identification command reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub panel_type: PanelType,
    pub rps_version: ProtocolVersion,
    pub protocol_version: ProtocolVersion,
    pub execute_version: ProtocolVersion,
    pub features: FeatureMask,
}

impl Identity {
    const MIN_LEN: usize = 14;

    /// Parse identification reply data, rejecting busy panels.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_LEN {
            return Err(PanelError::MalformedReply {
                command: Command::WhatAreYou { extended: false }.opcode(),
                details: format!("identification reply of {} bytes", data.len()),
            });
        }
        match data[13] {
            0 => {}
            1 => {
                return Err(PanelError::PanelBusy {
                    reason: "automation connection slots exhausted".to_string(),
                })
            }
            2 => {
                return Err(PanelError::PanelBusy {
                    reason: "RPS connection slots exhausted".to_string(),
                })
            }
            other => debug!("Ignoring identification busy code {}", other),
        }
        let version = |at: usize| ProtocolVersion::from_bytes(&data[at..at + 4]).unwrap_or_default();
        Ok(Self {
            panel_type: PanelType::from_code(data[0]),
            rps_version: version(1),
            protocol_version: version(5),
            execute_version: version(9),
            features: FeatureMask::new(&data[Self::MIN_LEN..]),
        })
    }
}

/// The command-protocol operations over one connection.
///
/// Every method is a strict request/reply sequence through the
/// [`CommandEngine`]; callers serialize whole operations with the
/// controller's command gate.
#[derive(Clone)]
pub struct PanelComm {
    engine: Arc<CommandEngine>,
    state: SharedState,
    events: EventSender,
}

impl PanelComm {
    pub fn new(engine: Arc<CommandEngine>, state: SharedState, events: EventSender) -> Self {
        Self {
            engine,
            state,
            events,
        }
    }

    fn emit(&self, events: Vec<PanelEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
    }

    /// Raise a controller-error event and hand the error back.
    fn report(&self, err: PanelError) -> PanelError {
        let _ = self.events.send(PanelEvent::from_error(&err));
        err
    }

    /// Negotiated capabilities, or a legacy profile before identification.
    pub async fn capabilities(&self) -> Capabilities {
        match &self.state.read().await.capabilities {
            Some(caps) => caps.clone(),
            None => Capabilities::new(
                PanelType::Unknown(0),
                ProtocolVersion::default(),
                FirmwareVersion::default(),
                FeatureMask::default(),
                true,
            ),
        }
    }

    async fn check_version(&self, command: &Command) -> Result<()> {
        let Some(required) = command.required_protocol() else {
            return Ok(());
        };
        if let Some(caps) = &self.state.read().await.capabilities {
            if !caps.protocol_version.at_least(&required) {
                return Err(PanelError::ProtocolTooOld {
                    required,
                    actual: caps.protocol_version,
                });
            }
        }
        Ok(())
    }

    async fn exchange(&self, command: &Command) -> Result<Reply> {
        self.check_version(command).await?;
        self.engine.send(command).await
    }

    async fn exec_data(&self, command: &Command) -> Result<Vec<u8>> {
        match self.exchange(command).await {
            Ok(reply) => reply.into_data().map_err(|e| self.report(e)),
            Err(e) => Err(self.report(e)),
        }
    }

    async fn exec_ack(&self, command: &Command) -> Result<()> {
        match self.exchange(command).await {
            Ok(reply) => reply.into_ack().map_err(|e| self.report(e)),
            Err(e) => Err(self.report(e)),
        }
    }

    async fn exec_optional(&self, command: &Command) -> Result<Vec<u8>> {
        match self.exchange(command).await {
            Ok(reply) => reply.into_optional_data().map_err(|e| self.report(e)),
            Err(e) => Err(self.report(e)),
        }
    }

    fn malformed(&self, command: &Command, details: String) -> PanelError {
        self.report(PanelError::MalformedReply {
            command: command.opcode(),
            details,
        })
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Identify the panel. The extended dialect is tried first unless legacy
    /// mode is forced; a NACK falls back to the minimal dialect.
    pub async fn identify(&self, force_legacy: bool) -> Result<Identity> {
        if !force_legacy {
            let extended = Command::WhatAreYou { extended: true };
            match self.exchange(&extended).await.and_then(Reply::into_data) {
                Ok(data) => return Identity::parse(&data).map_err(|e| self.report(e)),
                Err(PanelError::Nack(reason)) => {
                    debug!("Extended identification refused ({}), using minimal", reason);
                }
                Err(e) => return Err(self.report(e)),
            }
        }
        let data = self.exec_data(&Command::WhatAreYou { extended: false }).await?;
        Identity::parse(&data).map_err(|e| self.report(e))
    }

    /// Log in with the configured credential.
    pub async fn authenticate(&self, credential: &str, user_type: UserType) -> Result<()> {
        let command = match auth_dialect(user_type) {
            AuthDialect::Passcode => Command::Passcode {
                passcode: credential.to_string(),
            },
            AuthDialect::RemoteUser => Command::LoginRemoteUser {
                code: credential.to_string(),
            },
        };
        let data = self.exec_data(&command).await?;
        match data.first() {
            Some(1) => {
                info!("Authenticated as {:?}", user_type);
                Ok(())
            }
            Some(0) => Err(self.report(PanelError::NotAuthorized)),
            Some(2) => Err(self.report(PanelError::PanelBusy {
                reason: "authentication busy".to_string(),
            })),
            other => Err(self.malformed(&command, format!("authentication code {:?}", other))),
        }
    }

    pub async fn read_capacities(&self) -> Result<Capacities> {
        let command = Command::PanelCapacities;
        let data = self.exec_data(&command).await?;
        let caps = Capacities::from_bytes(&data)
            .ok_or_else(|| self.malformed(&command, format!("{} bytes", data.len())))?;
        debug!(
            "Panel capacities: {} areas, {} points, {} outputs",
            caps.max_areas, caps.max_points, caps.max_outputs
        );
        self.state.write().await.capacities = caps;
        Ok(caps)
    }

    /// Firmware field width depends on the panel family.
    pub async fn read_firmware(&self, panel_type: PanelType) -> Result<FirmwareVersion> {
        let command = Command::FirmwareVersion;
        let data = self.exec_data(&command).await?;
        let firmware = match (panel_type.firmware_field_width(), data.as_slice()) {
            (1, [version, revision, ..]) => {
                FirmwareVersion::new(u16::from(*version), u16::from(*revision))
            }
            (2, [v0, v1, r0, r1, ..]) => FirmwareVersion::new(
                u16::from_be_bytes([*v0, *v1]),
                u16::from_be_bytes([*r0, *r1]),
            ),
            _ => return Err(self.malformed(&command, format!("{} bytes", data.len()))),
        };
        info!("Panel firmware version: {}", firmware);
        Ok(firmware)
    }

    async fn read_mask(&self, command: &Command, kind: &'static str, max: u16) -> Result<Vec<u16>> {
        let data = self.exec_data(command).await?;
        let units = decode_bitmask(&data);
        if let Some(&number) = units.iter().find(|n| **n > max) {
            return Err(self.report(PanelError::CapacityExceeded { kind, number, max }));
        }
        Ok(units)
    }

    pub async fn discover_areas(&self) -> Result<Vec<u16>> {
        let areas = self.read_mask(&Command::ConfiguredAreas, "area", MAX_AREAS).await?;
        let mut state = self.state.write().await;
        for &n in &areas {
            state.areas.insert(n, Area::new(n));
        }
        debug!("Area discovery complete: {} areas found", areas.len());
        Ok(areas)
    }

    pub async fn discover_outputs(&self) -> Result<Vec<u16>> {
        let outputs = self
            .read_mask(&Command::ConfiguredOutputs, "output", MAX_OUTPUTS)
            .await?;
        let mut state = self.state.write().await;
        for &n in &outputs {
            state.outputs.insert(n, Output::new(n));
        }
        debug!("Output discovery complete: {} outputs found", outputs.len());
        Ok(outputs)
    }

    /// Populate the point table area by area.
    pub async fn discover_points(&self) -> Result<usize> {
        let areas = self.state.read().await.area_numbers();
        let mut total = 0;
        for area in areas {
            let points = self
                .read_mask(&Command::PointsInArea { area }, "point", MAX_POINTS)
                .await?;
            total += points.len();
            let mut state = self.state.write().await;
            for n in points {
                state.points.insert(n, Point::new(n, area));
            }
        }
        debug!("Point discovery complete: {} points found", total);
        Ok(total)
    }

    /// Load display text for every known unit of `kind`.
    pub async fn load_text(&self, kind: TextKind) -> Result<()> {
        let caps = self.capabilities().await;
        match text_dialect(&caps, kind) {
            TextDialect::Single => {
                let numbers = {
                    let state = self.state.read().await;
                    match kind {
                        TextKind::Area => state.area_numbers(),
                        TextKind::Output => state.output_numbers(),
                        TextKind::Point => state.point_numbers(),
                    }
                };
                for number in numbers {
                    let text = self.fetch_text(kind, number).await?;
                    self.store_text(kind, number, text).await;
                }
            }
            TextDialect::Paged => {
                for (number, text) in self.fetch_text_pages(kind).await? {
                    self.store_text(kind, number, text).await;
                }
            }
        }
        Ok(())
    }

    fn text_command(kind: TextKind, dialect: TextDialect, number: u16) -> Command {
        match kind {
            TextKind::Area => Command::AreaText { dialect, number },
            TextKind::Output => Command::OutputText { dialect, number },
            TextKind::Point => Command::PointText { dialect, number },
        }
    }

    /// One round trip per unit.
    pub async fn fetch_text(&self, kind: TextKind, number: u16) -> Result<String> {
        let command = Self::text_command(kind, TextDialect::Single, number);
        let data = self.exec_optional(&command).await?;
        Ok(read_nul_text(&data).0)
    }

    /// Cursor-driven walk; an empty page ends it, so N pages cost N+1
    /// requests.
    pub async fn fetch_text_pages(&self, kind: TextKind) -> Result<Vec<(u16, String)>> {
        let mut entries = Vec::new();
        let mut cursor = 0u16;
        for _ in 0..MAX_TEXT_PAGES {
            let command = Self::text_command(kind, TextDialect::Paged, cursor);
            let data = self.exec_optional(&command).await?;
            if data.is_empty() {
                debug!("Loaded {} {} texts", entries.len(), kind.name());
                return Ok(entries);
            }
            let page = parse_text_page(command.opcode(), &data).map_err(|e| self.report(e))?;
            let Some(&(last, _)) = page.last() else {
                return Ok(entries);
            };
            if last <= cursor && cursor != 0 {
                warn!("{} text cursor did not advance past {}", kind.name(), cursor);
                return Ok(entries);
            }
            entries.extend(page);
            cursor = last;
        }
        Err(self.report(PanelError::PageLimit {
            pages: MAX_TEXT_PAGES,
        }))
    }

    async fn store_text(&self, kind: TextKind, number: u16, text: String) {
        let mut state = self.state.write().await;
        let stored = match kind {
            TextKind::Area => state.areas.get_mut(&number).map(|a| a.set_text(text)),
            TextKind::Output => state.outputs.get_mut(&number).map(|o| o.set_text(text)),
            TextKind::Point => state.points.get_mut(&number).map(|p| p.set_text(text)),
        };
        if stored.is_none() {
            debug!("Text for unknown {} {} ignored", kind.name(), number);
        }
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Query point status in batches of at most 66.
    pub async fn poll_points(&self) -> Result<()> {
        let (numbers, seeded) = {
            let state = self.state.read().await;
            (state.point_numbers(), state.seeded)
        };
        for batch in numbers.chunks(POINT_STATUS_BATCH) {
            let command = Command::PointStatus {
                points: batch.to_vec(),
            };
            let data = self.exec_data(&command).await?;
            let triples =
                parse_status_triples(command.opcode(), &data).map_err(|e| self.report(e))?;
            let mut events = Vec::new();
            {
                let mut state = self.state.write().await;
                for (number, code) in triples {
                    if let Some(point) = state.points.get_mut(&number) {
                        if point.set_status(PointStatus::from_code(code)) || !seeded {
                            events.push(PanelEvent::PointStatusChanged {
                                point: point.clone(),
                            });
                        }
                    }
                }
            }
            self.emit(events);
        }
        Ok(())
    }

    /// Output status comes back as one bitmask of active outputs.
    pub async fn poll_outputs(&self) -> Result<()> {
        let data = self.exec_data(&Command::OutputStatus).await?;
        let active: BTreeSet<u16> = decode_bitmask(&data).into_iter().collect();
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let seeded = state.seeded;
            for output in state.outputs.values_mut() {
                if output.set_state(active.contains(&output.number)) || !seeded {
                    events.push(PanelEvent::OutputStateChanged {
                        output: output.clone(),
                    });
                }
            }
        }
        self.emit(events);
        Ok(())
    }

    /// Area arming status, readiness, and derived fault counts.
    pub async fn poll_areas(&self) -> Result<()> {
        let (numbers, seeded) = {
            let state = self.state.read().await;
            (state.area_numbers(), state.seeded)
        };
        let mut events = Vec::new();

        for batch in numbers.chunks(AREA_STATUS_BATCH) {
            let command = Command::AreaStatus {
                areas: batch.to_vec(),
            };
            let data = self.exec_data(&command).await?;
            let triples =
                parse_status_triples(command.opcode(), &data).map_err(|e| self.report(e))?;
            let mut state = self.state.write().await;
            for (number, code) in triples {
                if let Some(area) = state.areas.get_mut(&number) {
                    if area.set_status(AreaStatus::from_code(code)) || !seeded {
                        events.push(PanelEvent::AreaOnOffChanged { area: area.clone() });
                    }
                }
            }
        }

        let not_all = self.not_ready(ReadyType::AllOn).await?;
        let not_part = self.not_ready(ReadyType::PartOn).await?;
        {
            let mut state = self.state.write().await;
            for number in numbers {
                let faults = state.derived_fault_count(number);
                if let Some(area) = state.areas.get_mut(&number) {
                    let ready = area.set_ready(!not_all.contains(&number), !not_part.contains(&number));
                    let faulted = area.set_fault_count(faults);
                    if ready || faulted || !seeded {
                        events.push(PanelEvent::AreaReadyChanged { area: area.clone() });
                    }
                }
            }
        }
        self.emit(events);
        Ok(())
    }

    async fn not_ready(&self, ready_type: ReadyType) -> Result<BTreeSet<u16>> {
        let data = self.exec_data(&Command::AreasNotReady { ready_type }).await?;
        Ok(decode_bitmask(&data).into_iter().collect())
    }

    /// Poll the alarm-memory summary and walk the detail of every active
    /// priority.
    pub async fn poll_alarms(&self) -> Result<()> {
        let command = Command::AlarmMemorySummary;
        let data = self.exec_data(&command).await?;
        if data.len() < ALARM_PRIORITY_COUNT * 2 {
            return Err(self.malformed(&command, format!("summary of {} bytes", data.len())));
        }
        let seeded = self.state.read().await.seeded;
        let mut changed = BTreeSet::new();
        for (i, pair) in data.chunks_exact(2).take(ALARM_PRIORITY_COUNT).enumerate() {
            let priority = (i + 1) as u8;
            let count = u16::from_be_bytes([pair[0], pair[1]]);
            let active = if count == 0 {
                BTreeSet::new()
            } else {
                self.fetch_alarm_detail(priority).await?
            };
            changed.extend(self.project_priority(priority, &active).await);
        }

        let events = {
            let state = self.state.read().await;
            state
                .areas
                .values()
                .filter(|a| !seeded || changed.contains(&a.number))
                .map(|a| PanelEvent::AreaAlarmChanged { area: a.clone() })
                .collect()
        };
        self.emit(events);
        Ok(())
    }

    /// Areas listed in the alarm memory for `priority`, across all pages.
    pub async fn fetch_alarm_detail(&self, priority: u8) -> Result<BTreeSet<u16>> {
        let mut areas = BTreeSet::new();
        let mut last = None;
        for _ in 0..MAX_ALARM_PAGES {
            let command = Command::AlarmMemoryDetail { priority, last };
            let data = self.exec_data(&command).await?;
            if data.len() % AlarmRecord::LEN != 0 {
                return Err(self.malformed(&command, format!("detail of {} bytes", data.len())));
            }
            let mut more = false;
            for record in data.chunks_exact(AlarmRecord::LEN).filter_map(AlarmRecord::from_bytes) {
                if record.area == ALARM_DETAIL_MORE {
                    more = true;
                } else {
                    areas.insert(record.area);
                    last = Some(record);
                }
            }
            if !more {
                return Ok(areas);
            }
            if last.is_none() {
                return Err(self.malformed(&command, "more pages but no record to seed".to_string()));
            }
        }
        Err(self.report(PanelError::PageLimit {
            pages: MAX_ALARM_PAGES,
        }))
    }

    /// Set `priority` on `active` areas and clear it everywhere else.
    /// Returns the areas whose alarm state changed.
    pub async fn project_priority(&self, priority: u8, active: &BTreeSet<u16>) -> Vec<u16> {
        let mut state = self.state.write().await;
        state
            .areas
            .values_mut()
            .filter_map(|area| {
                area.set_priority(priority, active.contains(&area.number))
                    .then_some(area.number)
            })
            .collect()
    }

    /// Fetch one priority's detail and raise events for changed areas. Used
    /// for notification-driven alarm updates.
    pub async fn refresh_alarm_priority(&self, priority: u8) -> Result<()> {
        let active = self.fetch_alarm_detail(priority).await?;
        let changed = self.project_priority(priority, &active).await;
        let events = {
            let state = self.state.read().await;
            changed
                .iter()
                .filter_map(|n| state.areas.get(n))
                .map(|a| PanelEvent::AreaAlarmChanged { area: a.clone() })
                .collect()
        };
        self.emit(events);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Switch an output; the address width is chosen per call.
    pub async fn set_output_state(&self, number: u16, on: bool) -> Result<()> {
        if !self.state.read().await.outputs.contains_key(&number) {
            return Err(self.report(PanelError::InvalidUnit {
                kind: "output",
                number,
            }));
        }
        let dialect = output_dialect(&self.capabilities().await);
        self.exec_ack(&Command::SetOutputState {
            dialect,
            output: number,
            on,
        })
        .await?;
        debug!("Output {} set {}", number, if on { "on" } else { "off" });

        let mut events = Vec::new();
        if let Some(output) = self.state.write().await.outputs.get_mut(&number) {
            if output.set_state(on) {
                events.push(PanelEvent::OutputStateChanged {
                    output: output.clone(),
                });
            }
        }
        self.emit(events);
        Ok(())
    }

    pub async fn arm_areas(&self, areas: &[u16], arming: ArmingType) -> Result<()> {
        let (missing, mask_len) = {
            let state = self.state.read().await;
            let missing = areas.iter().copied().find(|n| !state.areas.contains_key(n));
            (missing, state.capacities.area_mask_len())
        };
        if let Some(number) = missing {
            return Err(self.report(PanelError::InvalidUnit { kind: "area", number }));
        }
        let mask = encode_bitmask(areas, mask_len).map_err(|e| self.report(e))?;
        self.exec_ack(&Command::ArmAreas { arming, mask }).await?;
        info!("Areas {:?}: {:?} accepted", areas, arming);
        Ok(())
    }

    /// Enable push delivery if the panel supports it. Returns whether
    /// notifications are now being received.
    pub async fn subscribe(&self) -> Result<bool> {
        let Some(dialect) = subscription_dialect(&self.capabilities().await) else {
            debug!("Subscriptions unavailable, staying in polling mode");
            return Ok(false);
        };
        self.exec_ack(&Command::SetSubscriptions { dialect }).await?;
        info!("Subscribed to panel notifications ({:?})", dialect);
        self.state.write().await.receiving_notifications = true;
        self.emit(vec![PanelEvent::ReceivingNotificationsChanged { receiving: true }]);
        Ok(true)
    }

    pub async fn terminate(&self) -> Result<()> {
        self.exec_ack(&Command::TerminateSession).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident_bytes(panel: u8, busy: u8, features: &[u8]) -> Vec<u8> {
        let mut d = vec![panel];
        d.extend_from_slice(&[1, 0, 0, 0]);
        d.extend_from_slice(&[5, 208, 0, 1]);
        d.extend_from_slice(&[2, 1, 0, 0]);
        d.push(busy);
        d.extend_from_slice(features);
        d
    }

    #[test]
    fn test_identity_parse() {
        let id = Identity::parse(&ident_bytes(0xA4, 0, &[0x80, 0])).unwrap();
        assert_eq!(id.panel_type, PanelType::B5512);
        assert_eq!(id.protocol_version, ProtocolVersion::new(5, 208, 1));
        assert_eq!(id.rps_version, ProtocolVersion::new(1, 0, 0));
        assert!(id.features.bit(0));
    }

    #[test]
    fn test_identity_busy_codes_are_fatal() {
        for busy in [1, 2] {
            let err = Identity::parse(&ident_bytes(0xA4, busy, &[])).unwrap_err();
            assert!(matches!(err, PanelError::PanelBusy { .. }));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_identity_too_short() {
        assert!(matches!(
            Identity::parse(&[0xA4, 1, 2]),
            Err(PanelError::MalformedReply { .. })
        ));
    }
}
