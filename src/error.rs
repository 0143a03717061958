// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::fmt;

use crate::version::ProtocolVersion;

/// Reason codes carried by a negative acknowledgement (status 0xFD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackReason {
    /// 0x00 - Non-specific error
    NonSpecific,
    /// 0x01 - Checksum failure
    ChecksumFailure,
    /// 0x02 - Invalid size / length
    InvalidLength,
    /// 0x03 - Invalid command
    InvalidCommand,
    /// 0x04 - Invalid interface state
    InvalidInterfaceState,
    /// 0x05 - Data out of range
    DataOutOfRange,
    /// 0x06 - No authority
    NoAuthority,
    /// 0x07 - Unsupported command
    UnsupportedCommand,
    /// 0x08 - Cannot arm panel
    CannotArm,
    /// 0x09 - Invalid remote ID
    InvalidRemoteId,
    /// 0x0A - Invalid license
    InvalidLicense,
    /// 0x0B - Invalid magic number
    InvalidMagicNumber,
    /// 0x0C - Expired license
    ExpiredLicense,
    /// 0x0D - Expired magic number
    ExpiredMagicNumber,
    /// 0x0E - Unsupported format version
    UnsupportedFormat,
    /// 0x11 - Firmware update in progress
    FirmwareUpdateInProgress,
    /// 0x12 - Incompatible firmware version
    IncompatibleFirmware,
    /// 0x13 - All points not configured
    PointsNotConfigured,
    /// 0x20 - Execution function: no errors
    ExecutionNoError,
    /// 0x21 - Execution function: invalid area
    ExecutionInvalidArea,
    /// 0x22 - Execution function: invalid command
    ExecutionInvalidCommand,
    /// 0x23 - Execution function: not authenticated
    ExecutionNotAuthenticated,
    /// 0x24 - Execution function: invalid user
    ExecutionInvalidUser,
    /// 0x40 - Parameter incorrect
    ParameterIncorrect,
    /// 0x41 - Sequence error
    SequenceError,
    /// 0x42 - Invalid configuration request
    InvalidConfigurationRequest,
    /// 0x43 - Invalid size
    InvalidSize,
    /// 0x44 - Time out
    TimeOut,
    /// Any code outside the table
    Unknown(u8),
}

impl NackReason {
    /// Map a reason byte from the panel.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::NonSpecific,
            0x01 => Self::ChecksumFailure,
            0x02 => Self::InvalidLength,
            0x03 => Self::InvalidCommand,
            0x04 => Self::InvalidInterfaceState,
            0x05 => Self::DataOutOfRange,
            0x06 => Self::NoAuthority,
            0x07 => Self::UnsupportedCommand,
            0x08 => Self::CannotArm,
            0x09 => Self::InvalidRemoteId,
            0x0A => Self::InvalidLicense,
            0x0B => Self::InvalidMagicNumber,
            0x0C => Self::ExpiredLicense,
            0x0D => Self::ExpiredMagicNumber,
            0x0E => Self::UnsupportedFormat,
            0x11 => Self::FirmwareUpdateInProgress,
            0x12 => Self::IncompatibleFirmware,
            0x13 => Self::PointsNotConfigured,
            0x20 => Self::ExecutionNoError,
            0x21 => Self::ExecutionInvalidArea,
            0x22 => Self::ExecutionInvalidCommand,
            0x23 => Self::ExecutionNotAuthenticated,
            0x24 => Self::ExecutionInvalidUser,
            0x40 => Self::ParameterIncorrect,
            0x41 => Self::SequenceError,
            0x42 => Self::InvalidConfigurationRequest,
            0x43 => Self::InvalidSize,
            0x44 => Self::TimeOut,
            other => Self::Unknown(other),
        }
    }

    /// The wire byte for this reason.
    pub fn code(&self) -> u8 {
        match self {
            Self::NonSpecific => 0x00,
            Self::ChecksumFailure => 0x01,
            Self::InvalidLength => 0x02,
            Self::InvalidCommand => 0x03,
            Self::InvalidInterfaceState => 0x04,
            Self::DataOutOfRange => 0x05,
            Self::NoAuthority => 0x06,
            Self::UnsupportedCommand => 0x07,
            Self::CannotArm => 0x08,
            Self::InvalidRemoteId => 0x09,
            Self::InvalidLicense => 0x0A,
            Self::InvalidMagicNumber => 0x0B,
            Self::ExpiredLicense => 0x0C,
            Self::ExpiredMagicNumber => 0x0D,
            Self::UnsupportedFormat => 0x0E,
            Self::FirmwareUpdateInProgress => 0x11,
            Self::IncompatibleFirmware => 0x12,
            Self::PointsNotConfigured => 0x13,
            Self::ExecutionNoError => 0x20,
            Self::ExecutionInvalidArea => 0x21,
            Self::ExecutionInvalidCommand => 0x22,
            Self::ExecutionNotAuthenticated => 0x23,
            Self::ExecutionInvalidUser => 0x24,
            Self::ParameterIncorrect => 0x40,
            Self::SequenceError => 0x41,
            Self::InvalidConfigurationRequest => 0x42,
            Self::InvalidSize => 0x43,
            Self::TimeOut => 0x44,
            Self::Unknown(code) => *code,
        }
    }

    /// Human-readable description of the reason.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NonSpecific => "Non-specific error",
            Self::ChecksumFailure => "Checksum failure",
            Self::InvalidLength => "Invalid size / length",
            Self::InvalidCommand => "Invalid command",
            Self::InvalidInterfaceState => "Invalid interface state",
            Self::DataOutOfRange => "Data out of range",
            Self::NoAuthority => "No authority",
            Self::UnsupportedCommand => "Unsupported command",
            Self::CannotArm => "Cannot arm panel",
            Self::InvalidRemoteId => "Invalid remote ID",
            Self::InvalidLicense => "Invalid license",
            Self::InvalidMagicNumber => "Invalid magic number",
            Self::ExpiredLicense => "Expired license",
            Self::ExpiredMagicNumber => "Expired magic number",
            Self::UnsupportedFormat => "Unsupported format version",
            Self::FirmwareUpdateInProgress => "Firmware update in progress",
            Self::IncompatibleFirmware => "Incompatible firmware version",
            Self::PointsNotConfigured => "All points not configured",
            Self::ExecutionNoError => "Execution function: no errors",
            Self::ExecutionInvalidArea => "Execution function: invalid area",
            Self::ExecutionInvalidCommand => "Execution function: invalid command",
            Self::ExecutionNotAuthenticated => "Execution function: not authenticated",
            Self::ExecutionInvalidUser => "Execution function: invalid user",
            Self::ParameterIncorrect => "Parameter incorrect",
            Self::SequenceError => "Sequence error",
            Self::InvalidConfigurationRequest => "Invalid configuration request",
            Self::InvalidSize => "Invalid size",
            Self::TimeOut => "Time out",
            Self::Unknown(_) => "Unknown reason",
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}: {}", self.code(), self.description())
    }
}

/// Classification carried by [`PanelEvent::ControllerError`](crate::event::PanelEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown leading tag
    InvalidProtocol,
    /// Bad tag, bad declared length, oversized frame
    Framing,
    /// Notification length did not match its records
    Length,
    /// Panel rejected a command
    Nack,
    /// Status byte outside the success codes
    UndefinedReply,
    /// Credential length, rejection, or busy
    Authentication,
    /// Negotiated version below a command's minimum
    VersionPrecondition,
    /// A bring-up step failed
    Configuration,
    /// Timeout, socket error, or closed connection
    Transport,
    /// Discovered unit count over the compiled ceiling
    Capacity,
}

/// All errors that can occur in the bosch-mode2 library.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Idle timeout: no data for {secs}s")]
    IdleTimeout { secs: u64 },

    #[error("Not connected")]
    Disconnected,

    #[error("No reply to {command}")]
    CommandTimeout { command: &'static str },

    #[error("Invalid protocol tag: 0x{tag:02X}")]
    InvalidProtocol { tag: u8 },

    #[error("Frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Panel NACK: {0}")]
    Nack(NackReason),

    #[error("Undefined reply status: 0x{status:02X}")]
    UndefinedReply { status: u8 },

    #[error("Unexpected reply status: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedStatus { expected: u8, actual: u8 },

    #[error("Malformed reply to command 0x{command:02X}: {details}")]
    MalformedReply { command: u8, details: String },

    #[error("Malformed notification: {details}")]
    MalformedNotification { details: String },

    #[error("Credential length {len} outside {min}..={max}")]
    CredentialLength { len: usize, min: usize, max: usize },

    #[error("Credential must be numeric")]
    CredentialFormat,

    #[error("Authentication rejected")]
    NotAuthorized,

    #[error("Panel busy: {reason}")]
    PanelBusy { reason: String },

    #[error("Protocol version {actual} below required {required}")]
    ProtocolTooOld { required: ProtocolVersion, actual: ProtocolVersion },

    #[error("Configuration step '{step}' failed: {source}")]
    Configuration {
        step: &'static str,
        #[source]
        source: Box<PanelError>,
    },

    #[error("{kind} {number} exceeds ceiling {max}")]
    CapacityExceeded { kind: &'static str, number: u16, max: u16 },

    #[error("Invalid {kind} number: {number}")]
    InvalidUnit { kind: &'static str, number: u16 },

    #[error("Pagination did not terminate after {pages} pages")]
    PageLimit { pages: usize },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl PanelError {
    /// Classify the error for controller-error events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PanelError::Io(_)
            | PanelError::Tls(_)
            | PanelError::ConnectionTimeout
            | PanelError::IdleTimeout { .. }
            | PanelError::Disconnected
            | PanelError::CommandTimeout { .. } => ErrorKind::Transport,
            PanelError::InvalidProtocol { .. } => ErrorKind::InvalidProtocol,
            PanelError::FrameTooShort { .. }
            | PanelError::LengthMismatch { .. }
            | PanelError::FrameTooLarge { .. }
            | PanelError::MalformedReply { .. }
            | PanelError::PageLimit { .. } => ErrorKind::Framing,
            PanelError::MalformedNotification { .. } => ErrorKind::Length,
            PanelError::Nack(_) => ErrorKind::Nack,
            PanelError::UndefinedReply { .. } | PanelError::UnexpectedStatus { .. } => {
                ErrorKind::UndefinedReply
            }
            PanelError::CredentialLength { .. }
            | PanelError::CredentialFormat
            | PanelError::NotAuthorized
            | PanelError::PanelBusy { .. } => ErrorKind::Authentication,
            PanelError::ProtocolTooOld { .. } => ErrorKind::VersionPrecondition,
            PanelError::Configuration { .. } | PanelError::InvalidConfig { .. } => {
                ErrorKind::Configuration
            }
            PanelError::CapacityExceeded { .. } | PanelError::InvalidUnit { .. } => {
                ErrorKind::Capacity
            }
        }
    }

    /// Whether the connection cannot be used after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            PanelError::Configuration { source, .. } => source.is_fatal(),
            other => matches!(
                other.kind(),
                ErrorKind::Transport | ErrorKind::Authentication | ErrorKind::Capacity
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_reason_table() {
        assert_eq!(NackReason::from_code(0x06), NackReason::NoAuthority);
        assert_eq!(NackReason::from_code(0x44), NackReason::TimeOut);
        assert_eq!(NackReason::from_code(0x99), NackReason::Unknown(0x99));
        for code in [0x00, 0x07, 0x0E, 0x13, 0x24, 0x43, 0x99] {
            assert_eq!(NackReason::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_nack_display() {
        assert_eq!(NackReason::CannotArm.to_string(), "0x08: Cannot arm panel");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(PanelError::InvalidProtocol { tag: 7 }.kind(), ErrorKind::InvalidProtocol);
        assert_eq!(
            PanelError::LengthMismatch { declared: 3, actual: 2 }.kind(),
            ErrorKind::Framing
        );
        assert_eq!(PanelError::Nack(NackReason::NoAuthority).kind(), ErrorKind::Nack);
        assert_eq!(
            PanelError::CommandTimeout { command: "AreaStatus" }.kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            PanelError::ProtocolTooOld {
                required: ProtocolVersion::new(5, 0, 0),
                actual: ProtocolVersion::new(1, 2, 3),
            }
            .kind(),
            ErrorKind::VersionPrecondition
        );
    }

    #[test]
    fn test_configuration_error_fatality_follows_source() {
        let busy = PanelError::Configuration {
            step: "identify",
            source: Box::new(PanelError::PanelBusy { reason: "RPS".into() }),
        };
        assert!(busy.is_fatal());
        assert_eq!(busy.kind(), ErrorKind::Configuration);

        let nack = PanelError::Configuration {
            step: "area text",
            source: Box::new(PanelError::Nack(NackReason::InvalidCommand)),
        };
        assert!(!nack.is_fatal());
    }
}
