// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::fmt;

/// Negotiated protocol version reported by the identification command.
///
/// Field order gives the derived ordering: major, then minor, then micro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub micro: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, micro: u16) -> Self {
        Self { major, minor, micro }
    }

    /// Parse a `major(1) minor(1) micro(2)` triple.
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        match b {
            [major, minor, hi, lo, ..] => {
                Some(Self::new(*major, *minor, u16::from_be_bytes([*hi, *lo])))
            }
            _ => None,
        }
    }

    pub fn at_least(&self, required: &ProtocolVersion) -> bool {
        self >= required
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Panel firmware version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub version: u16,
    pub revision: u16,
}

impl FirmwareVersion {
    pub const fn new(version: u16, revision: u16) -> Self {
        Self { version, revision }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.version, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version_ordering() {
        let v = ProtocolVersion::new(5, 203, 0);
        assert!(v.at_least(&ProtocolVersion::new(5, 203, 0)));
        assert!(v.at_least(&ProtocolVersion::new(5, 200, 9999)));
        assert!(v.at_least(&ProtocolVersion::new(4, 255, 0)));
        assert!(!v.at_least(&ProtocolVersion::new(5, 203, 1)));
        assert!(!v.at_least(&ProtocolVersion::new(6, 0, 0)));
    }

    #[test]
    fn test_protocol_version_from_bytes() {
        assert_eq!(
            ProtocolVersion::from_bytes(&[5, 208, 0x01, 0x02]),
            Some(ProtocolVersion::new(5, 208, 0x0102))
        );
        assert_eq!(ProtocolVersion::from_bytes(&[5, 208, 1]), None);
    }

    #[test]
    fn test_firmware_version_display() {
        assert_eq!(FirmwareVersion::new(3, 7).to_string(), "3.07");
        assert_eq!(FirmwareVersion::new(2, 112).to_string(), "2.112");
    }
}
