// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

//! Per-connection session aggregate.
//!
//! One [`SessionState`] lives behind a shared `RwLock` and is handed to both
//! the command layer and the notification decoder. It is cleared on every
//! (re)connect and rebuilt from the panel.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::capabilities::Capabilities;
use crate::constants::MAX_AREAS;
use crate::devices::{Area, Output, Point};

/// Unit capacities declared by the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacities {
    pub max_areas: u16,
    pub max_points: u16,
    pub max_outputs: u16,
    pub max_users: u16,
    pub max_keypads: u8,
    pub max_doors: u8,
}

impl Capacities {
    /// Parse the capacities reply data.
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        match b {
            [a0, a1, p0, p1, o0, o1, u0, u1, keypads, doors, ..] => Some(Self {
                max_areas: u16::from_be_bytes([*a0, *a1]),
                max_points: u16::from_be_bytes([*p0, *p1]),
                max_outputs: u16::from_be_bytes([*o0, *o1]),
                max_users: u16::from_be_bytes([*u0, *u1]),
                max_keypads: *keypads,
                max_doors: *doors,
            }),
            _ => None,
        }
    }

    /// Bytes in an area bitmask: ceil(max_areas/8), falling back to the
    /// compiled ceiling when the panel has not reported yet.
    pub fn area_mask_len(&self) -> usize {
        let areas = if self.max_areas == 0 { MAX_AREAS } else { self.max_areas.min(MAX_AREAS) };
        usize::from(areas).div_ceil(8)
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub areas: BTreeMap<u16, Area>,
    pub points: BTreeMap<u16, Point>,
    pub outputs: BTreeMap<u16, Output>,
    pub capabilities: Option<Capabilities>,
    pub capacities: Capacities,
    pub panel_ready: bool,
    pub receiving_notifications: bool,
    /// Set after the first full poll cycle; until then every value is reported.
    pub seeded: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Drop every table and flag. Called at the start of each connect.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn point_numbers(&self) -> Vec<u16> {
        self.points.keys().copied().collect()
    }

    pub fn area_numbers(&self) -> Vec<u16> {
        self.areas.keys().copied().collect()
    }

    pub fn output_numbers(&self) -> Vec<u16> {
        self.outputs.keys().copied().collect()
    }

    /// Points in `area` whose status is not normal.
    pub fn derived_fault_count(&self, area: u16) -> u16 {
        self.points
            .values()
            .filter(|p| p.area == area && p.status.is_fault())
            .count() as u16
    }

    /// Mark the connection unusable.
    pub fn mark_down(&mut self) {
        self.panel_ready = false;
        self.receiving_notifications = false;
    }
}

pub type SharedState = Arc<RwLock<SessionState>>;

pub fn shared_state() -> SharedState {
    Arc::new(RwLock::new(SessionState::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::PointStatus;

    #[test]
    fn test_capacities_from_bytes() {
        let caps =
            Capacities::from_bytes(&[0, 8, 0, 75, 0, 3, 0, 32, 8, 2]).unwrap();
        assert_eq!(caps.max_areas, 8);
        assert_eq!(caps.max_points, 75);
        assert_eq!(caps.max_outputs, 3);
        assert_eq!(caps.max_users, 32);
        assert_eq!(caps.max_keypads, 8);
        assert_eq!(caps.max_doors, 2);
        assert_eq!(caps.area_mask_len(), 1);
        assert!(Capacities::from_bytes(&[0, 8]).is_none());
    }

    #[test]
    fn test_area_mask_len() {
        assert_eq!(Capacities::default().area_mask_len(), 4);
        let caps = Capacities { max_areas: 9, ..Default::default() };
        assert_eq!(caps.area_mask_len(), 2);
    }

    #[test]
    fn test_reset_clears_tables() {
        let mut state = SessionState::default();
        state.areas.insert(1, Area::new(1));
        state.points.insert(1, Point::new(1, 1));
        state.outputs.insert(1, Output::new(1));
        state.panel_ready = true;
        state.seeded = true;
        state.reset();
        assert!(state.areas.is_empty());
        assert!(state.points.is_empty());
        assert!(state.outputs.is_empty());
        assert!(!state.panel_ready);
        assert!(!state.seeded);
    }

    #[test]
    fn test_derived_fault_count() {
        let mut state = SessionState::default();
        for (n, area, status) in [
            (1, 1, PointStatus::Normal),
            (2, 1, PointStatus::Open),
            (3, 1, PointStatus::Short),
            (4, 2, PointStatus::Open),
        ] {
            let mut p = Point::new(n, area);
            p.status = status;
            state.points.insert(n, p);
        }
        assert_eq!(state.derived_fault_count(1), 2);
        assert_eq!(state.derived_fault_count(2), 1);
        assert_eq!(state.derived_fault_count(3), 0);
    }
}
