// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use bitflags::bitflags;

use crate::constants::ALARM_PRIORITY_COUNT;

bitflags! {
    /// Active alarm-memory priorities for an area. Bit `p-1` is priority `p`.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PriorityMask: u16 {
        /// 1 - Burglary trouble
        const BURGLARY_TROUBLE     = 1 << 0;
        /// 2 - Burglary supervisory
        const BURGLARY_SUPERVISORY = 1 << 1;
        /// 3 - Gas trouble
        const GAS_TROUBLE          = 1 << 2;
        /// 4 - Gas supervisory
        const GAS_SUPERVISORY      = 1 << 3;
        /// 5 - Fire trouble
        const FIRE_TROUBLE         = 1 << 4;
        /// 6 - Fire supervisory
        const FIRE_SUPERVISORY     = 1 << 5;
        /// 7 - Burglary alarm
        const BURGLARY_ALARM       = 1 << 6;
        /// 8 - Personal emergency
        const PERSONAL_EMERGENCY   = 1 << 7;
        /// 9 - Gas alarm
        const GAS_ALARM            = 1 << 8;
        /// 10 - Fire alarm
        const FIRE_ALARM           = 1 << 9;
    }
}

impl PriorityMask {
    /// Flag for a 1-based priority, `None` outside 1..=10.
    pub fn from_priority(priority: u8) -> Option<Self> {
        if priority == 0 || usize::from(priority) > ALARM_PRIORITY_COUNT {
            return None;
        }
        Some(Self::from_bits_truncate(1 << (priority - 1)))
    }
}

/// Alarm category derived from the active priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmCategory {
    Fire,
    Gas,
    Personal,
    Burglary,
}

/// Severity within a category, ordered trouble < supervisory < alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlarmLevel {
    #[default]
    None,
    Trouble,
    Supervisory,
    Alarm,
}

impl AlarmCategory {
    pub const ALL: [AlarmCategory; 4] = [Self::Fire, Self::Gas, Self::Personal, Self::Burglary];

    /// Highest level whose priority is set in `mask`.
    pub fn level(self, mask: PriorityMask) -> AlarmLevel {
        let (trouble, supervisory, alarm) = match self {
            Self::Fire => (
                PriorityMask::FIRE_TROUBLE,
                PriorityMask::FIRE_SUPERVISORY,
                PriorityMask::FIRE_ALARM,
            ),
            Self::Gas => (
                PriorityMask::GAS_TROUBLE,
                PriorityMask::GAS_SUPERVISORY,
                PriorityMask::GAS_ALARM,
            ),
            Self::Burglary => (
                PriorityMask::BURGLARY_TROUBLE,
                PriorityMask::BURGLARY_SUPERVISORY,
                PriorityMask::BURGLARY_ALARM,
            ),
            // Personal emergency has a single alarm level.
            Self::Personal => (
                PriorityMask::empty(),
                PriorityMask::empty(),
                PriorityMask::PERSONAL_EMERGENCY,
            ),
        };
        if mask.intersects(alarm) {
            AlarmLevel::Alarm
        } else if mask.intersects(supervisory) {
            AlarmLevel::Supervisory
        } else if mask.intersects(trouble) {
            AlarmLevel::Trouble
        } else {
            AlarmLevel::None
        }
    }
}

/// Area arming status as reported by the area-status command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AreaStatus {
    #[default]
    Unknown,
    AllOnInstant,
    AllOnDelay,
    PartOnInstant,
    PartOnDelay,
    Disarmed,
    AllOnEntryDelay,
    PartOnEntryDelay,
    AllOnExitDelay,
    PartOnExitDelay,
    AllOnInstantArmed,
    Stay1On,
    Stay2On,
    AwayOn,
    AwayExitDelay,
    AwayEntryDelay,
}

impl AreaStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::AllOnInstant,
            2 => Self::AllOnDelay,
            3 => Self::PartOnInstant,
            4 => Self::PartOnDelay,
            5 => Self::Disarmed,
            6 => Self::AllOnEntryDelay,
            7 => Self::PartOnEntryDelay,
            8 => Self::AllOnExitDelay,
            9 => Self::PartOnExitDelay,
            10 => Self::AllOnInstantArmed,
            11 => Self::Stay1On,
            12 => Self::Stay2On,
            13 => Self::AwayOn,
            14 => Self::AwayExitDelay,
            15 => Self::AwayEntryDelay,
            _ => Self::Unknown,
        }
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self, Self::Disarmed | Self::Unknown)
    }

    /// Part-on (perimeter/stay) rather than all-on.
    pub fn is_part_on(&self) -> bool {
        matches!(
            self,
            Self::PartOnInstant
                | Self::PartOnDelay
                | Self::PartOnEntryDelay
                | Self::PartOnExitDelay
                | Self::Stay1On
                | Self::Stay2On
        )
    }

    pub fn is_exit_delay(&self) -> bool {
        matches!(self, Self::AllOnExitDelay | Self::PartOnExitDelay | Self::AwayExitDelay)
    }

    pub fn is_entry_delay(&self) -> bool {
        matches!(self, Self::AllOnEntryDelay | Self::PartOnEntryDelay | Self::AwayEntryDelay)
    }
}

/// A single panel area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    pub number: u16,
    pub text: String,
    pub status: AreaStatus,
    pub ready_all_on: bool,
    pub ready_part_on: bool,
    pub fault_count: u16,
    pub alarm_priorities: PriorityMask,
}

impl Area {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            text: String::new(),
            status: AreaStatus::Unknown,
            ready_all_on: false,
            ready_part_on: false,
            fault_count: 0,
            alarm_priorities: PriorityMask::empty(),
        }
    }

    pub fn alarm_level(&self, category: AlarmCategory) -> AlarmLevel {
        category.level(self.alarm_priorities)
    }

    pub fn in_alarm(&self) -> bool {
        AlarmCategory::ALL
            .iter()
            .any(|c| self.alarm_level(*c) == AlarmLevel::Alarm)
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        true
    }

    pub fn set_status(&mut self, status: AreaStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    pub fn set_ready(&mut self, all_on: bool, part_on: bool) -> bool {
        if self.ready_all_on == all_on && self.ready_part_on == part_on {
            return false;
        }
        self.ready_all_on = all_on;
        self.ready_part_on = part_on;
        true
    }

    pub fn set_fault_count(&mut self, count: u16) -> bool {
        if self.fault_count == count {
            return false;
        }
        self.fault_count = count;
        true
    }

    /// Set or clear one priority. Out-of-range priorities are ignored.
    pub fn set_priority(&mut self, priority: u8, active: bool) -> bool {
        let Some(flag) = PriorityMask::from_priority(priority) else {
            return false;
        };
        let mut next = self.alarm_priorities;
        next.set(flag, active);
        self.apply_priority_mask(next)
    }

    /// Replace the whole priority mask; applying the same mask twice reports
    /// a change only the first time.
    pub fn apply_priority_mask(&mut self, mask: PriorityMask) -> bool {
        if self.alarm_priorities == mask {
            return false;
        }
        self.alarm_priorities = mask;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_status_codes() {
        assert_eq!(AreaStatus::from_code(5), AreaStatus::Disarmed);
        assert_eq!(AreaStatus::from_code(13), AreaStatus::AwayOn);
        assert_eq!(AreaStatus::from_code(99), AreaStatus::Unknown);
        assert!(AreaStatus::AwayOn.is_armed());
        assert!(!AreaStatus::Disarmed.is_armed());
        assert!(AreaStatus::Stay1On.is_part_on());
        assert!(AreaStatus::AwayExitDelay.is_exit_delay());
    }

    #[test]
    fn test_priority_mask_bits() {
        assert_eq!(PriorityMask::from_priority(1), Some(PriorityMask::BURGLARY_TROUBLE));
        assert_eq!(PriorityMask::from_priority(10), Some(PriorityMask::FIRE_ALARM));
        assert_eq!(PriorityMask::from_priority(0), None);
        assert_eq!(PriorityMask::from_priority(11), None);
    }

    #[test]
    fn test_alarm_levels_ranked() {
        let mask = PriorityMask::FIRE_TROUBLE | PriorityMask::FIRE_ALARM | PriorityMask::GAS_SUPERVISORY;
        assert_eq!(AlarmCategory::Fire.level(mask), AlarmLevel::Alarm);
        assert_eq!(AlarmCategory::Gas.level(mask), AlarmLevel::Supervisory);
        assert_eq!(AlarmCategory::Burglary.level(mask), AlarmLevel::None);
        assert_eq!(
            AlarmCategory::Personal.level(PriorityMask::PERSONAL_EMERGENCY),
            AlarmLevel::Alarm
        );
        assert!(AlarmLevel::Trouble < AlarmLevel::Supervisory);
    }

    #[test]
    fn test_priority_mask_idempotent() {
        let mut area = Area::new(1);
        let mask = PriorityMask::BURGLARY_ALARM | PriorityMask::GAS_TROUBLE;
        assert!(area.apply_priority_mask(mask));
        let snapshot = area.clone();
        assert!(!area.apply_priority_mask(mask));
        assert_eq!(area, snapshot);
        assert!(area.in_alarm());
    }

    #[test]
    fn test_set_priority_reports_transitions() {
        let mut area = Area::new(2);
        assert!(area.set_priority(7, true));
        assert!(!area.set_priority(7, true));
        assert_eq!(area.alarm_level(AlarmCategory::Burglary), AlarmLevel::Alarm);
        assert!(area.set_priority(7, false));
        assert!(!area.set_priority(7, false));
        assert!(!area.set_priority(42, true));
    }

    #[test]
    fn test_mutators_report_changes() {
        let mut area = Area::new(3);
        assert!(area.set_status(AreaStatus::Disarmed));
        assert!(!area.set_status(AreaStatus::Disarmed));
        assert!(area.set_ready(true, true));
        assert!(!area.set_ready(true, true));
        assert!(area.set_fault_count(2));
        assert!(!area.set_fault_count(2));
        assert!(area.set_text("Garage"));
        assert!(!area.set_text("Garage"));
    }
}
