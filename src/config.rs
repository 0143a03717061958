// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::time::Duration;

use crate::constants::{PASSCODE_MAX_LEN, PASSCODE_MIN_LEN, REMOTE_CODE_MAX_LEN, REMOTE_CODE_MIN_LEN};
use crate::error::{PanelError, Result};

/// Which login path the credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    /// Automation passcode, sent as space-padded text (6-24 chars)
    AutomationUser,
    /// Installer/remote-user code, sent nibble-packed (3-8 digits)
    InstallerApp,
}

impl UserType {
    /// Parse a config name ("automation", "installer").
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "automation" | "automationuser" | "automation_user" => Some(Self::AutomationUser),
            "installer" | "installerapp" | "installer_app" | "remote" => Some(Self::InstallerApp),
            _ => None,
        }
    }

    /// Accepted credential length range for this login path.
    pub fn credential_bounds(&self) -> (usize, usize) {
        match self {
            Self::AutomationUser => (PASSCODE_MIN_LEN, PASSCODE_MAX_LEN),
            Self::InstallerApp => (REMOTE_CODE_MIN_LEN, REMOTE_CODE_MAX_LEN),
        }
    }
}

/// Arming type byte for the arm-areas command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArmingType {
    Disarm = 0x01,
    MasterInstantArm = 0x02,
    MasterDelayArm = 0x03,
    PerimeterInstantArm = 0x04,
    PerimeterDelayArm = 0x05,
    ForceMasterDelayArm = 0x06,
    ForceMasterInstantArm = 0x07,
    ForcePerimeterDelayArm = 0x08,
    ForcePerimeterInstantArm = 0x09,
}

impl ArmingType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a CLI/config name (e.g. "disarm", "away", "stay").
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "disarm" => Some(Self::Disarm),
            "away" | "master_delay" => Some(Self::MasterDelayArm),
            "away_instant" | "master_instant" => Some(Self::MasterInstantArm),
            "stay" | "perimeter_delay" => Some(Self::PerimeterDelayArm),
            "stay_instant" | "perimeter_instant" => Some(Self::PerimeterInstantArm),
            "force_away" => Some(Self::ForceMasterDelayArm),
            "force_away_instant" => Some(Self::ForceMasterInstantArm),
            "force_stay" => Some(Self::ForcePerimeterDelayArm),
            "force_stay_instant" => Some(Self::ForcePerimeterInstantArm),
            _ => None,
        }
    }
}

/// Configuration for connecting to a panel.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Panel host name or IP address
    pub host: String,
    /// Panel TLS port (default: 7700)
    pub port: u16,
    /// Automation passcode or remote-user code
    pub passcode: String,
    /// Login path for `passcode`
    pub user_type: UserType,
    /// Skip capability negotiation and subscriptions; always poll
    pub force_legacy_mode: bool,
    /// Tear the connection down after this long without inbound data
    pub idle_timeout_ms: u64,
    /// Delay between poll cycles when not subscribed
    pub poll_interval_ms: u64,
    /// TCP + TLS connect timeout
    pub connect_timeout_ms: u64,
    /// Capacity of the broadcast event channel
    pub event_capacity: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 7700,
            passcode: String::new(),
            user_type: UserType::AutomationUser,
            force_legacy_mode: false,
            idle_timeout_ms: 180_000,
            poll_interval_ms: 500,
            connect_timeout_ms: 10_000,
            event_capacity: 256,
        }
    }
}

impl PanelConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::default()
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Presence and length checks, run once before connecting.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PanelError::InvalidConfig {
                details: "host is required".to_string(),
            });
        }
        if self.port == 0 {
            return Err(PanelError::InvalidConfig {
                details: "port must be non-zero".to_string(),
            });
        }
        let (min, max) = self.user_type.credential_bounds();
        let len = self.passcode.len();
        if len < min || len > max {
            return Err(PanelError::CredentialLength { len, min, max });
        }
        if self.user_type == UserType::InstallerApp
            && !self.passcode.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PanelError::CredentialFormat);
        }
        if self.idle_timeout_ms == 0 {
            return Err(PanelError::InvalidConfig {
                details: "idle_timeout_ms must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for PanelConfig.
#[derive(Debug, Clone, Default)]
pub struct PanelConfigBuilder {
    config: PanelConfig,
}

impl PanelConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.config.passcode = passcode.into();
        self
    }

    pub fn user_type(mut self, user_type: UserType) -> Self {
        self.config.user_type = user_type;
        self
    }

    pub fn force_legacy_mode(mut self, force: bool) -> Self {
        self.config.force_legacy_mode = force;
        self
    }

    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> PanelConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PanelConfigBuilder {
        PanelConfig::builder().host("10.0.0.5").passcode("123456")
    }

    #[test]
    fn test_config_defaults() {
        let config = PanelConfig::builder().build();
        assert_eq!(config.port, 7700);
        assert_eq!(config.idle_timeout(), Duration::from_secs(180));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.user_type, UserType::AutomationUser);
        assert!(!config.force_legacy_mode);
    }

    #[test]
    fn test_config_builder() {
        let config = base()
            .port(7701)
            .user_type(UserType::InstallerApp)
            .force_legacy_mode(true)
            .poll_interval_ms(1000)
            .build();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 7701);
        assert_eq!(config.user_type, UserType::InstallerApp);
        assert!(config.force_legacy_mode);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_validate_accepts_automation_passcode() {
        assert!(base().build().validate().is_ok());
        assert!(base().passcode("a".repeat(24)).build().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_lengths() {
        assert!(matches!(
            base().passcode("12345").build().validate(),
            Err(PanelError::CredentialLength { len: 5, min: 6, max: 24 })
        ));
        assert!(matches!(
            base().passcode("a".repeat(25)).build().validate(),
            Err(PanelError::CredentialLength { len: 25, .. })
        ));
        let installer = base().user_type(UserType::InstallerApp);
        assert!(installer.clone().passcode("1234").build().validate().is_ok());
        assert!(matches!(
            installer.clone().passcode("12").build().validate(),
            Err(PanelError::CredentialLength { .. })
        ));
        assert!(matches!(
            installer.passcode("12a4").build().validate(),
            Err(PanelError::CredentialFormat)
        ));
    }

    #[test]
    fn test_validate_requires_host() {
        let config = PanelConfig::builder().passcode("123456").build();
        assert!(matches!(config.validate(), Err(PanelError::InvalidConfig { .. })));
    }

    #[test]
    fn test_arming_type_names() {
        assert_eq!(ArmingType::from_name("away"), Some(ArmingType::MasterDelayArm));
        assert_eq!(ArmingType::from_name("STAY"), Some(ArmingType::PerimeterDelayArm));
        assert_eq!(ArmingType::from_name("disarm").map(ArmingType::code), Some(0x01));
        assert_eq!(ArmingType::from_name("bogus"), None);
    }

    #[test]
    fn test_user_type_names() {
        assert_eq!(UserType::from_name("installer"), Some(UserType::InstallerApp));
        assert_eq!(UserType::from_name("Automation"), Some(UserType::AutomationUser));
        assert_eq!(UserType::from_name("guest"), None);
    }
}
