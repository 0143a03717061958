// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

//! Push-notification decoding.
//!
//! A notification frame is decoded in full before anything is applied, so a
//! malformed frame never leaves the session half-updated. Applying the
//! decoded records is synchronous and never talks to the panel: anything
//! that needs a command (alarm detail, output re-poll) comes back as a
//! [`FollowUp`] for the connection's worker to run under the command gate.

use chrono::Utc;
use tracing::{debug, trace};

use crate::constants::{item, TAG_NOTIFICATION};
use crate::devices::{AreaStatus, PointStatus};
use crate::error::{PanelError, Result};
use crate::event::PanelEvent;
use crate::session::SessionState;

/// Area readiness code carried by the area-ready item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyCode {
    NotReady,
    PartReady,
    AllReady,
}

impl ReadyCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            2 => Self::AllReady,
            1 => Self::PartReady,
            _ => Self::NotReady,
        }
    }

    /// `(ready_all_on, ready_part_on)`
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::NotReady => (false, false),
            Self::PartReady => (false, true),
            Self::AllReady => (true, true),
        }
    }
}

/// One decoded status-item entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Heartbeat,
    AlarmSummary { priority: u8, count: u16 },
    AreaOnOff { area: u16, status: u8 },
    AreaReady { area: u16, ready: ReadyCode, faults: u16 },
    OutputState { output: u16, pattern: u8 },
    PointState { point: u16, status: u8 },
    PanelSystemStatus { raw: [u8; 4] },
    PointStateExtended {
        point: u16,
        status: u8,
        area: u16,
        bypassable: bool,
        point_code: u8,
        condition: u32,
    },
}

/// Work a notification needs done through the command engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    FetchAlarmDetail { priority: u8 },
    RefreshOutputs,
}

/// Result of applying a decoded frame.
#[derive(Debug, Default)]
pub struct Projection {
    pub events: Vec<PanelEvent>,
    pub follow_ups: Vec<FollowUp>,
}

impl Projection {
    fn follow_up(&mut self, f: FollowUp) {
        if !self.follow_ups.contains(&f) {
            self.follow_ups.push(f);
        }
    }
}

fn entry_size(item_type: u8) -> Option<usize> {
    match item_type {
        item::CONFIDENCE_HEARTBEAT => Some(0),
        item::ALARM_SUMMARY => Some(3),
        item::AREA_ON_OFF => Some(3),
        item::AREA_READY => Some(5),
        item::OUTPUT_STATE => Some(3),
        item::POINT_STATE => Some(3),
        item::PANEL_SYSTEM_STATUS => Some(4),
        item::POINT_STATE_EXTENDED => Some(10),
        _ => None,
    }
}

fn be16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn malformed(details: String) -> PanelError {
    PanelError::MalformedNotification { details }
}

fn decode_entry(item_type: u8, e: &[u8]) -> Notification {
    match item_type {
        item::ALARM_SUMMARY => Notification::AlarmSummary {
            priority: e[0],
            count: be16(&e[1..3]),
        },
        item::AREA_ON_OFF => Notification::AreaOnOff {
            area: be16(e),
            status: e[2],
        },
        item::AREA_READY => Notification::AreaReady {
            area: be16(e),
            ready: ReadyCode::from_code(e[2]),
            faults: be16(&e[3..5]),
        },
        item::OUTPUT_STATE => Notification::OutputState {
            output: be16(e),
            pattern: e[2],
        },
        item::POINT_STATE => Notification::PointState {
            point: be16(e),
            status: e[2],
        },
        item::PANEL_SYSTEM_STATUS => Notification::PanelSystemStatus {
            raw: [e[0], e[1], e[2], e[3]],
        },
        item::POINT_STATE_EXTENDED => Notification::PointStateExtended {
            point: be16(e),
            status: e[2],
            area: be16(&e[3..5]),
            bypassable: e[5] != 0,
            point_code: e[6],
            condition: u32::from_be_bytes([0, e[7], e[8], e[9]]),
        },
        _ => Notification::Heartbeat,
    }
}

/// Decode a whole notification frame: `[0x02][len(2)][records]`.
pub fn decode(frame: &[u8]) -> Result<Vec<Notification>> {
    if frame.len() < 3 {
        return Err(malformed(format!("frame of {} bytes", frame.len())));
    }
    if frame[0] != TAG_NOTIFICATION {
        return Err(PanelError::InvalidProtocol { tag: frame[0] });
    }
    let declared = usize::from(be16(&frame[1..3]));
    let body = &frame[3..];
    if declared != body.len() {
        return Err(malformed(format!(
            "declared {} bytes, got {}",
            declared,
            body.len()
        )));
    }

    let mut out = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        if rest.len() < 2 {
            return Err(malformed("truncated record header".to_string()));
        }
        let (item_type, count) = (rest[0], usize::from(rest[1]));
        let size = entry_size(item_type)
            .ok_or_else(|| malformed(format!("unknown item type {}", item_type)))?;
        let need = size * count;
        rest = &rest[2..];
        if rest.len() < need {
            return Err(malformed(format!(
                "item {} needs {} bytes, {} left",
                item_type,
                need,
                rest.len()
            )));
        }
        if item_type == item::CONFIDENCE_HEARTBEAT {
            out.push(Notification::Heartbeat);
        } else {
            out.extend(rest[..need].chunks_exact(size).map(|e| decode_entry(item_type, e)));
        }
        rest = &rest[need..];
    }
    Ok(out)
}

/// Project decoded notifications onto the session.
///
/// Events are produced only for actual transitions.
pub fn apply(state: &mut SessionState, notifications: &[Notification]) -> Projection {
    let mut proj = Projection::default();
    let output_numbers_unreliable = state
        .capabilities
        .as_ref()
        .is_some_and(|c| c.panel_type.is_solution_or_amax());

    for n in notifications {
        match n {
            Notification::Heartbeat => {
                let at = Utc::now();
                state.last_heartbeat = Some(at);
                proj.events.push(PanelEvent::ConfidenceHeartbeat { at });
            }
            Notification::AlarmSummary { priority, count } => {
                if *count == 0 {
                    for area in state.areas.values_mut() {
                        if area.set_priority(*priority, false) {
                            proj.events.push(PanelEvent::AreaAlarmChanged { area: area.clone() });
                        }
                    }
                } else {
                    proj.follow_up(FollowUp::FetchAlarmDetail { priority: *priority });
                }
            }
            Notification::AreaOnOff { area, status } => match state.areas.get_mut(area) {
                Some(a) => {
                    if a.set_status(AreaStatus::from_code(*status)) {
                        proj.events.push(PanelEvent::AreaOnOffChanged { area: a.clone() });
                    }
                }
                None => debug!("On/off notification for unknown area {}", area),
            },
            Notification::AreaReady { area, ready, faults } => match state.areas.get_mut(area) {
                Some(a) => {
                    let (all_on, part_on) = ready.flags();
                    let ready_changed = a.set_ready(all_on, part_on);
                    let faults_changed = a.set_fault_count(*faults);
                    if ready_changed || faults_changed {
                        proj.events.push(PanelEvent::AreaReadyChanged { area: a.clone() });
                    }
                }
                None => debug!("Ready notification for unknown area {}", area),
            },
            Notification::OutputState { output, pattern } => {
                if output_numbers_unreliable {
                    proj.follow_up(FollowUp::RefreshOutputs);
                    continue;
                }
                match state.outputs.get_mut(output) {
                    Some(o) => {
                        if o.set_state(*pattern != 0) {
                            proj.events.push(PanelEvent::OutputStateChanged { output: o.clone() });
                        }
                    }
                    None => debug!("Output notification for unknown output {}", output),
                }
            }
            Notification::PointState { point, status } => match state.points.get_mut(point) {
                Some(p) => {
                    if p.set_status(PointStatus::from_code(*status)) {
                        proj.events.push(PanelEvent::PointStatusChanged { point: p.clone() });
                    }
                }
                None => debug!("Point notification for unknown point {}", point),
            },
            Notification::PanelSystemStatus { raw } => {
                trace!("Panel system status {:02X?}", raw);
            }
            Notification::PointStateExtended {
                point,
                status,
                area,
                bypassable,
                point_code,
                condition,
            } => match state.points.get_mut(point) {
                Some(p) => {
                    let status = PointStatus::from_code(*status);
                    if p.apply_extended(status, *area, *bypassable, *point_code, *condition) {
                        proj.events.push(PanelEvent::PointStatusChanged { point: p.clone() });
                    }
                }
                None => debug!("Extended notification for unknown point {}", point),
            },
        }
    }
    proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capabilities, FeatureMask, PanelType};
    use crate::devices::{Area, Output, Point};
    use crate::version::{FirmwareVersion, ProtocolVersion};

    fn frame(records: &[u8]) -> Vec<u8> {
        let mut f = vec![TAG_NOTIFICATION];
        f.extend_from_slice(&(records.len() as u16).to_be_bytes());
        f.extend_from_slice(records);
        f
    }

    fn state_with(panel_type: PanelType) -> SessionState {
        let mut state = SessionState::default();
        state.capabilities = Some(Capabilities::new(
            panel_type,
            ProtocolVersion::new(5, 208, 0),
            FirmwareVersion::new(3, 0),
            FeatureMask::default(),
            false,
        ));
        for n in 1..=2 {
            state.areas.insert(n, Area::new(n));
            state.points.insert(n, Point::new(n, 1));
            state.outputs.insert(n, Output::new(n));
        }
        state
    }

    #[test]
    fn test_decode_mixed_records() {
        let f = frame(&[
            0, 0, // heartbeat
            7, 2, 0, 1, 3, 0, 2, 2, // two point states
            5, 1, 0, 1, 2, 0, 0, // area ready
        ]);
        let decoded = decode(&f).unwrap();
        assert_eq!(
            decoded,
            vec![
                Notification::Heartbeat,
                Notification::PointState { point: 1, status: 3 },
                Notification::PointState { point: 2, status: 2 },
                Notification::AreaReady { area: 1, ready: ReadyCode::AllReady, faults: 0 },
            ]
        );
    }

    #[test]
    fn test_decode_extended_point() {
        let f = frame(&[12, 1, 0, 5, 2, 0, 1, 1, 9, 0x12, 0x34, 0x56]);
        assert_eq!(
            decode(&f).unwrap(),
            vec![Notification::PointStateExtended {
                point: 5,
                status: 2,
                area: 1,
                bypassable: true,
                point_code: 9,
                condition: 0x12_3456,
            }]
        );
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let mut f = frame(&[7, 1, 0, 1, 3]);
        f.push(0);
        assert!(matches!(decode(&f), Err(PanelError::MalformedNotification { .. })));
    }

    #[test]
    fn test_decode_rejects_truncated_entries() {
        let f = frame(&[7, 2, 0, 1, 3, 0]);
        assert!(matches!(decode(&f), Err(PanelError::MalformedNotification { .. })));
    }

    #[test]
    fn test_decode_rejects_unknown_item() {
        let f = frame(&[99, 0]);
        let err = decode(&f).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Length);
    }

    #[test]
    fn test_malformed_frame_leaves_state_untouched() {
        let mut state = state_with(PanelType::B5512);
        let before: Vec<_> = state.points.values().cloned().collect();
        // Valid first record, truncated second record.
        let f = frame(&[7, 1, 0, 1, 2, 7, 1, 0]);
        assert!(decode(&f).is_err());
        let after: Vec<_> = state.points.values().cloned().collect();
        assert_eq!(before, after);
        // Nothing decoded means nothing applied.
        assert!(apply(&mut state, &[]).events.is_empty());
    }

    #[test]
    fn test_apply_point_and_area_changes() {
        let mut state = state_with(PanelType::B5512);
        let n = decode(&frame(&[7, 1, 0, 1, 2, 4, 1, 0, 2, 13])).unwrap();
        let proj = apply(&mut state, &n);
        assert_eq!(proj.events.len(), 2);
        assert!(matches!(&proj.events[0], PanelEvent::PointStatusChanged { point } if point.status == PointStatus::Open));
        assert!(matches!(&proj.events[1], PanelEvent::AreaOnOffChanged { area } if area.status == AreaStatus::AwayOn));
        // Same frame again: no transitions.
        assert!(apply(&mut state, &n).events.is_empty());
    }

    #[test]
    fn test_apply_alarm_summary() {
        let mut state = state_with(PanelType::B5512);
        if let Some(a) = state.areas.get_mut(&1) {
            a.set_priority(7, true);
        }
        let clear = apply(&mut state, &[Notification::AlarmSummary { priority: 7, count: 0 }]);
        assert_eq!(clear.events.len(), 1);
        assert!(clear.follow_ups.is_empty());

        let fetch = apply(
            &mut state,
            &[
                Notification::AlarmSummary { priority: 10, count: 1 },
                Notification::AlarmSummary { priority: 10, count: 1 },
            ],
        );
        assert!(fetch.events.is_empty());
        assert_eq!(fetch.follow_ups, vec![FollowUp::FetchAlarmDetail { priority: 10 }]);
    }

    #[test]
    fn test_solution_output_notification_repolls() {
        let mut state = state_with(PanelType::Solution3000);
        let proj = apply(&mut state, &[Notification::OutputState { output: 1, pattern: 1 }]);
        assert!(proj.events.is_empty());
        assert_eq!(proj.follow_ups, vec![FollowUp::RefreshOutputs]);
        assert!(!state.outputs[&1].on);

        let mut state = state_with(PanelType::B9512G);
        let proj = apply(&mut state, &[Notification::OutputState { output: 1, pattern: 1 }]);
        assert_eq!(proj.events.len(), 1);
        assert!(state.outputs[&1].on);
    }

    #[test]
    fn test_heartbeat_recorded() {
        let mut state = state_with(PanelType::B5512);
        let proj = apply(&mut state, &[Notification::Heartbeat]);
        assert!(matches!(proj.events[0], PanelEvent::ConfidenceHeartbeat { .. }));
        assert!(state.last_heartbeat.is_some());
    }
}
