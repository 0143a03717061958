// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

/// Point (sensor input) status byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PointStatus {
    #[default]
    Unassigned,
    Short,
    Open,
    Normal,
    Missing,
    Resistor2,
    Resistor4,
    Unknown,
}

impl PointStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unassigned,
            1 => Self::Short,
            2 => Self::Open,
            3 => Self::Normal,
            4 => Self::Missing,
            5 => Self::Resistor2,
            6 => Self::Resistor4,
            _ => Self::Unknown,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Counted as a fault when deriving an area's fault count.
    pub fn is_fault(&self) -> bool {
        !self.is_normal()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::Short => "Short",
            Self::Open => "Open",
            Self::Normal => "Normal",
            Self::Missing => "Missing",
            Self::Resistor2 => "Resistor 2",
            Self::Resistor4 => "Resistor 4",
            Self::Unknown => "Unknown",
        }
    }
}

/// A single point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub number: u16,
    pub area: u16,
    pub text: String,
    pub status: PointStatus,
    pub bypassable: bool,
    pub point_code: u8,
    /// Raw 24-bit condition bitfield from the extended notification.
    pub condition: u32,
}

impl Point {
    pub fn new(number: u16, area: u16) -> Self {
        Self {
            number,
            area,
            text: String::new(),
            status: PointStatus::Unassigned,
            bypassable: false,
            point_code: 0,
            condition: 0,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        true
    }

    pub fn set_status(&mut self, status: PointStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    /// Apply the extended point-state notification fields.
    pub fn apply_extended(
        &mut self,
        status: PointStatus,
        area: u16,
        bypassable: bool,
        point_code: u8,
        condition: u32,
    ) -> bool {
        let condition = condition & 0x00FF_FFFF;
        let changed = self.status != status
            || self.area != area
            || self.bypassable != bypassable
            || self.point_code != point_code
            || self.condition != condition;
        self.status = status;
        self.area = area;
        self.bypassable = bypassable;
        self.point_code = point_code;
        self.condition = condition;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_status_codes() {
        assert_eq!(PointStatus::from_code(3), PointStatus::Normal);
        assert_eq!(PointStatus::from_code(6), PointStatus::Resistor4);
        assert_eq!(PointStatus::from_code(200), PointStatus::Unknown);
        assert!(PointStatus::Open.is_fault());
        assert!(!PointStatus::Normal.is_fault());
        assert!(PointStatus::Missing.is_fault());
    }

    #[test]
    fn test_point_set_status() {
        let mut point = Point::new(4, 1);
        assert!(point.set_status(PointStatus::Normal));
        assert!(!point.set_status(PointStatus::Normal));
        assert!(point.set_status(PointStatus::Open));
    }

    #[test]
    fn test_point_apply_extended() {
        let mut point = Point::new(9, 1);
        assert!(point.apply_extended(PointStatus::Normal, 2, true, 7, 0x01_2345_67));
        assert_eq!(point.area, 2);
        assert_eq!(point.condition, 0x2345_67);
        assert!(!point.apply_extended(PointStatus::Normal, 2, true, 7, 0x2345_67));
        assert!(point.apply_extended(PointStatus::Normal, 2, false, 7, 0x2345_67));
    }
}
