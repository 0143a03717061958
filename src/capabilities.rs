// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

//! Panel identity and command-dialect selection.
//!
//! Everything the identification and version commands report is folded into
//! one [`Capabilities`] record when configuration runs. Dialect choice is then
//! a pure function of that record, so every call site picks the same format.

use crate::config::UserType;
use crate::version::{FirmwareVersion, ProtocolVersion};

/// Panel model as reported by the identification command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelType {
    Solution2000,
    Solution3000,
    Amax2100,
    Amax3000,
    Amax4000,
    D7412GV4,
    D9412GV4,
    B4512,
    B5512,
    B8512G,
    B9512G,
    B3512,
    B6512,
    Unknown(u8),
}

impl PanelType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x20 => Self::Solution2000,
            0x21 => Self::Solution3000,
            0x22 => Self::Amax2100,
            0x23 => Self::Amax3000,
            0x24 => Self::Amax4000,
            0x79 => Self::D7412GV4,
            0x84 => Self::D9412GV4,
            0xA0 => Self::B4512,
            0xA4 => Self::B5512,
            0xA6 => Self::B8512G,
            0xA7 => Self::B9512G,
            0xA8 => Self::B3512,
            0xA9 => Self::B6512,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Solution2000 => 0x20,
            Self::Solution3000 => 0x21,
            Self::Amax2100 => 0x22,
            Self::Amax3000 => 0x23,
            Self::Amax4000 => 0x24,
            Self::D7412GV4 => 0x79,
            Self::D9412GV4 => 0x84,
            Self::B4512 => 0xA0,
            Self::B5512 => 0xA4,
            Self::B8512G => 0xA6,
            Self::B9512G => 0xA7,
            Self::B3512 => 0xA8,
            Self::B6512 => 0xA9,
            Self::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Solution2000 => "Solution 2000",
            Self::Solution3000 => "Solution 3000",
            Self::Amax2100 => "AMAX 2100",
            Self::Amax3000 => "AMAX 3000",
            Self::Amax4000 => "AMAX 4000",
            Self::D7412GV4 => "D7412GV4",
            Self::D9412GV4 => "D9412GV4",
            Self::B4512 => "B4512",
            Self::B5512 => "B5512",
            Self::B8512G => "B8512G",
            Self::B9512G => "B9512G",
            Self::B3512 => "B3512",
            Self::B6512 => "B6512",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Solution and AMAX panels: 1-byte output addresses, 1-byte firmware
    /// version/revision fields, unreliable output numbers in push notifications.
    pub fn is_solution_or_amax(&self) -> bool {
        matches!(
            self,
            Self::Solution2000 | Self::Solution3000 | Self::Amax2100 | Self::Amax3000 | Self::Amax4000
        )
    }

    /// Byte width of each firmware field in the firmware version reply.
    pub fn firmware_field_width(&self) -> usize {
        if self.is_solution_or_amax() {
            1
        } else {
            2
        }
    }
}

/// Capability bits of the extended identification reply (MSB-first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    LoginRemoteUser = 4,
    OutputControl2Byte = 20,
    AreaTextPaged = 33,
    OutputTextPaged = 40,
    PointTextPaged = 45,
    SubscriptionsCf01 = 110,
    SubscriptionsCf02 = 111,
    SubscriptionsCf03 = 112,
}

impl Feature {
    pub fn bit(self) -> usize {
        self as usize
    }
}

/// Raw capability bitmask; empty when the minimal identification dialect was used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureMask(Vec<u8>);

impl FeatureMask {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.bit(feature.bit())
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0
            .get(index / 8)
            .is_some_and(|byte| byte & (0x80 >> (index % 8)) != 0)
    }

    pub fn set(&mut self, feature: Feature) {
        let index = feature.bit();
        if self.0.len() <= index / 8 {
            self.0.resize(index / 8 + 1, 0);
        }
        self.0[index / 8] |= 0x80 >> (index % 8);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Minimum protocol for the paged text dialect.
pub const PAGED_TEXT_MIN_PROTOCOL: ProtocolVersion = ProtocolVersion::new(2, 0, 0);
/// Minimum protocol for any subscription dialect.
pub const SUBSCRIPTION_MIN_PROTOCOL: ProtocolVersion = ProtocolVersion::new(5, 200, 0);

/// Output control address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDialect {
    /// CF00: 1-byte output number
    OneByte,
    /// CF01: 2-byte output number
    TwoByte,
}

/// Per-unit text retrieval dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDialect {
    /// CF01: one round trip per unit
    Single,
    /// CF03: cursor-driven pages of (number, text) pairs
    Paged,
}

/// Unit families that carry display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Area,
    Output,
    Point,
}

impl TextKind {
    pub fn paged_feature(self) -> Feature {
        match self {
            Self::Area => Feature::AreaTextPaged,
            Self::Output => Feature::OutputTextPaged,
            Self::Point => Feature::PointTextPaged,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Output => "output",
            Self::Point => "point",
        }
    }
}

/// Push subscription dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubscriptionDialect {
    Cf01,
    Cf02,
    Cf03,
}

/// Login command used for a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDialect {
    Passcode,
    RemoteUser,
}

/// Everything negotiated at configuration time that gates dialect choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub panel_type: PanelType,
    pub protocol_version: ProtocolVersion,
    pub firmware_version: FirmwareVersion,
    pub features: FeatureMask,
    pub force_legacy: bool,
}

impl Capabilities {
    pub fn new(
        panel_type: PanelType,
        protocol_version: ProtocolVersion,
        firmware_version: FirmwareVersion,
        features: FeatureMask,
        force_legacy: bool,
    ) -> Self {
        // Legacy mode ignores whatever the panel advertised.
        let features = if force_legacy { FeatureMask::default() } else { features };
        Self {
            panel_type,
            protocol_version,
            firmware_version,
            features,
            force_legacy,
        }
    }
}

pub fn output_dialect(caps: &Capabilities) -> OutputDialect {
    if caps.panel_type.is_solution_or_amax() {
        OutputDialect::OneByte
    } else if caps.features.has(Feature::OutputControl2Byte) {
        OutputDialect::TwoByte
    } else {
        OutputDialect::OneByte
    }
}

pub fn text_dialect(caps: &Capabilities, kind: TextKind) -> TextDialect {
    if caps.features.has(kind.paged_feature())
        && caps.protocol_version.at_least(&PAGED_TEXT_MIN_PROTOCOL)
    {
        TextDialect::Paged
    } else {
        TextDialect::Single
    }
}

/// `None` means the session must poll.
pub fn subscription_dialect(caps: &Capabilities) -> Option<SubscriptionDialect> {
    if caps.force_legacy || !caps.protocol_version.at_least(&SUBSCRIPTION_MIN_PROTOCOL) {
        return None;
    }
    if caps.features.has(Feature::SubscriptionsCf03) {
        Some(SubscriptionDialect::Cf03)
    } else if caps.features.has(Feature::SubscriptionsCf02) {
        Some(SubscriptionDialect::Cf02)
    } else if caps.features.has(Feature::SubscriptionsCf01) {
        Some(SubscriptionDialect::Cf01)
    } else {
        None
    }
}

pub fn auth_dialect(user_type: UserType) -> AuthDialect {
    match user_type {
        UserType::AutomationUser => AuthDialect::Passcode,
        UserType::InstallerApp => AuthDialect::RemoteUser,
    }
}
