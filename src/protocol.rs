// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use crate::capabilities::{
    OutputDialect, SubscriptionDialect, TextDialect, PAGED_TEXT_MIN_PROTOCOL,
    SUBSCRIPTION_MIN_PROTOCOL,
};
use crate::config::ArmingType;
use crate::constants::{
    cmd, format, MAX_FRAME_LEN, PASSCODE_MAX_LEN, PASSCODE_MIN_LEN, REMOTE_CODE_MAX_LEN,
    REMOTE_CODE_MIN_LEN, STATUS_ACK, STATUS_DATA, STATUS_NACK, TAG_SYNC,
};
use crate::error::{NackReason, PanelError, Result};
use crate::version::ProtocolVersion;

/// Commands that can be sent to the panel.
///
/// # Configuration Sequence
///
/// After the TLS handshake the session runs, strictly in order:
///
/// ```text
/// WhatAreYou (CF03, falls back to minimal on NACK)
/// Passcode | LoginRemoteUser
/// PanelCapacities, FirmwareVersion
/// ConfiguredAreas, AreaText*
/// ConfiguredOutputs, OutputText*
/// PointsInArea*, PointText*
/// ```
///
/// # Poll Cycle
///
/// Without subscriptions each cycle runs
/// `PointStatus*, OutputStatus, AreaStatus*, AreasNotReady x2, AlarmMemorySummary`
/// and an `AlarmMemoryDetail` walk for every non-zero priority.
///
/// # Dialects
///
/// Several commands carry a format byte after the opcode. The byte is chosen
/// by the pure selectors in [`capabilities`](crate::capabilities) and passed
/// in here, so the encoder never consults session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Identification. Extended (CF03) appends the feature bitmask.
    WhatAreYou { extended: bool },
    /// Ack-only session close.
    TerminateSession,
    /// Automation passcode, space-padded to 24 bytes.
    Passcode { passcode: String },
    /// Installer/remote-user code, nibble-packed into 4 bytes.
    LoginRemoteUser { code: String },
    PanelCapacities,
    FirmwareVersion,
    ConfiguredAreas,
    ConfiguredOutputs,
    /// Bitmask of points assigned to `area`.
    PointsInArea { area: u16 },
    /// Single: `number` is the unit. Paged: `number` is the cursor (0 to start).
    AreaText { dialect: TextDialect, number: u16 },
    OutputText { dialect: TextDialect, number: u16 },
    PointText { dialect: TextDialect, number: u16 },
    /// Up to 50 areas per request.
    AreaStatus { areas: Vec<u16> },
    AreasNotReady { ready_type: ReadyType },
    /// Up to 66 points per request.
    PointStatus { points: Vec<u16> },
    OutputStatus,
    AlarmMemorySummary,
    /// `last` seeds the next page of a multi-page walk.
    AlarmMemoryDetail { priority: u8, last: Option<AlarmRecord> },
    SetOutputState { dialect: OutputDialect, output: u16, on: bool },
    /// `mask` already sized to ceil(max_areas/8).
    ArmAreas { arming: ArmingType, mask: Vec<u8> },
    SetSubscriptions { dialect: SubscriptionDialect },
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::WhatAreYou { .. } => cmd::WHAT_ARE_YOU,
            Command::TerminateSession => cmd::TERMINATE_SESSION,
            Command::Passcode { .. } => cmd::PASSCODE,
            Command::LoginRemoteUser { .. } => cmd::LOGIN_REMOTE_USER,
            Command::PanelCapacities => cmd::PANEL_CAPACITIES,
            Command::FirmwareVersion => cmd::FIRMWARE_VERSION,
            Command::ConfiguredAreas => cmd::CONFIGURED_AREAS,
            Command::ConfiguredOutputs => cmd::CONFIGURED_OUTPUTS,
            Command::PointsInArea { .. } => cmd::POINTS_IN_AREA,
            Command::AreaText { .. } => cmd::AREA_TEXT,
            Command::OutputText { .. } => cmd::OUTPUT_TEXT,
            Command::PointText { .. } => cmd::POINT_TEXT,
            Command::AreaStatus { .. } => cmd::AREA_STATUS,
            Command::AreasNotReady { .. } => cmd::AREAS_NOT_READY,
            Command::PointStatus { .. } => cmd::POINT_STATUS,
            Command::OutputStatus => cmd::OUTPUT_STATUS,
            Command::AlarmMemorySummary => cmd::ALARM_MEMORY_SUMMARY,
            Command::AlarmMemoryDetail { .. } => cmd::ALARM_MEMORY_DETAIL,
            Command::SetOutputState { .. } => cmd::SET_OUTPUT_STATE,
            Command::ArmAreas { .. } => cmd::ARM_AREAS,
            Command::SetSubscriptions { .. } => cmd::SET_SUBSCRIPTIONS,
        }
    }

    /// Command-format byte, if this dialect carries one.
    pub fn format(&self) -> Option<u8> {
        match self {
            Command::WhatAreYou { extended: true } => Some(format::CF03),
            Command::AreaText { dialect, .. }
            | Command::OutputText { dialect, .. }
            | Command::PointText { dialect, .. } => Some(match dialect {
                TextDialect::Single => format::CF01,
                TextDialect::Paged => format::CF03,
            }),
            Command::SetOutputState { dialect: OutputDialect::TwoByte, .. } => Some(format::CF01),
            Command::SetSubscriptions { dialect } => Some(match dialect {
                SubscriptionDialect::Cf01 => format::CF01,
                SubscriptionDialect::Cf02 => format::CF02,
                SubscriptionDialect::Cf03 => format::CF03,
            }),
            _ => None,
        }
    }

    /// Minimum negotiated protocol for this command, if any.
    pub fn required_protocol(&self) -> Option<ProtocolVersion> {
        match self {
            Command::SetSubscriptions { .. } => Some(SUBSCRIPTION_MIN_PROTOCOL),
            Command::AreaText { dialect: TextDialect::Paged, .. }
            | Command::OutputText { dialect: TextDialect::Paged, .. }
            | Command::PointText { dialect: TextDialect::Paged, .. } => {
                Some(PAGED_TEXT_MIN_PROTOCOL)
            }
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::WhatAreYou { .. } => "WhatAreYou",
            Command::TerminateSession => "TerminateSession",
            Command::Passcode { .. } => "Passcode",
            Command::LoginRemoteUser { .. } => "LoginRemoteUser",
            Command::PanelCapacities => "PanelCapacities",
            Command::FirmwareVersion => "FirmwareVersion",
            Command::ConfiguredAreas => "ConfiguredAreas",
            Command::ConfiguredOutputs => "ConfiguredOutputs",
            Command::PointsInArea { .. } => "PointsInArea",
            Command::AreaText { .. } => "AreaText",
            Command::OutputText { .. } => "OutputText",
            Command::PointText { .. } => "PointText",
            Command::AreaStatus { .. } => "AreaStatus",
            Command::AreasNotReady { .. } => "AreasNotReady",
            Command::PointStatus { .. } => "PointStatus",
            Command::OutputStatus => "OutputStatus",
            Command::AlarmMemorySummary => "AlarmMemorySummary",
            Command::AlarmMemoryDetail { .. } => "AlarmMemoryDetail",
            Command::SetOutputState { .. } => "SetOutputState",
            Command::ArmAreas { .. } => "ArmAreas",
            Command::SetSubscriptions { .. } => "SetSubscriptions",
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Command::Passcode { passcode } => pad_passcode(passcode)?,
            Command::LoginRemoteUser { code } => pack_remote_code(code)?.to_vec(),
            Command::PointsInArea { area } => area.to_be_bytes().to_vec(),
            Command::AreaText { number, .. }
            | Command::OutputText { number, .. }
            | Command::PointText { number, .. } => number.to_be_bytes().to_vec(),
            Command::AreaStatus { areas } => numbers_to_bytes(areas),
            Command::PointStatus { points } => numbers_to_bytes(points),
            Command::AreasNotReady { ready_type } => vec![*ready_type as u8],
            Command::AlarmMemoryDetail { priority, last } => {
                let mut p = vec![*priority];
                if let Some(record) = last {
                    p.extend_from_slice(&record.to_bytes());
                }
                p
            }
            Command::SetOutputState { dialect, output, on } => {
                let mut p = match dialect {
                    OutputDialect::OneByte => {
                        let n = u8::try_from(*output).map_err(|_| PanelError::InvalidUnit {
                            kind: "output",
                            number: *output,
                        })?;
                        vec![n]
                    }
                    OutputDialect::TwoByte => output.to_be_bytes().to_vec(),
                };
                p.push(u8::from(*on));
                p
            }
            Command::ArmAreas { arming, mask } => {
                let mut p = vec![arming.code()];
                p.extend_from_slice(mask);
                p
            }
            Command::SetSubscriptions { dialect } => {
                let flags = match dialect {
                    SubscriptionDialect::Cf01 => 6,
                    SubscriptionDialect::Cf02 => 7,
                    SubscriptionDialect::Cf03 => 8,
                };
                vec![0x01; flags]
            }
            Command::WhatAreYou { .. }
            | Command::TerminateSession
            | Command::PanelCapacities
            | Command::FirmwareVersion
            | Command::ConfiguredAreas
            | Command::ConfiguredOutputs
            | Command::OutputStatus
            | Command::AlarmMemorySummary => Vec::new(),
        };
        Ok(payload)
    }

    /// Build the request for this command.
    pub fn to_request(&self) -> Result<Request> {
        Ok(Request {
            opcode: self.opcode(),
            format: self.format(),
            payload: self.payload()?,
        })
    }

    /// Encode straight to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.to_request()?.encode()
    }
}

/// Ready type byte for the areas-not-ready query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyType {
    AllOn = 0x01,
    PartOn = 0x02,
}

/// One alarm-memory detail record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmRecord {
    pub area: u16,
    pub item_type: u8,
    pub item: u16,
}

impl AlarmRecord {
    pub const LEN: usize = 5;

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        match b {
            [a0, a1, t, i0, i1, ..] => Some(Self {
                area: u16::from_be_bytes([*a0, *a1]),
                item_type: *t,
                item: u16::from_be_bytes([*i0, *i1]),
            }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> [u8; 5] {
        let [a0, a1] = self.area.to_be_bytes();
        let [i0, i1] = self.item.to_be_bytes();
        [a0, a1, self.item_type, i0, i1]
    }
}

/// A synchronous command frame: `[tag][len][opcode][format?][payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub opcode: u8,
    pub format: Option<u8>,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body_len = 1 + usize::from(self.format.is_some()) + self.payload.len();
        let total = body_len + 2;
        if total > MAX_FRAME_LEN {
            return Err(PanelError::FrameTooLarge {
                len: total,
                max: MAX_FRAME_LEN,
            });
        }
        let mut frame = Vec::with_capacity(total);
        frame.push(TAG_SYNC);
        frame.push(body_len as u8);
        frame.push(self.opcode);
        if let Some(fmt) = self.format {
            frame.push(fmt);
        }
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Decode a request frame. The format byte is not self-describing, so the
    /// caller states whether one is present.
    pub fn decode(frame: &[u8], with_format: bool) -> Result<Self> {
        let min = if with_format { 4 } else { 3 };
        if frame.len() < min {
            return Err(PanelError::FrameTooShort { len: frame.len() });
        }
        if frame[0] != TAG_SYNC {
            return Err(PanelError::InvalidProtocol { tag: frame[0] });
        }
        check_declared(frame[1] as usize, frame.len() - 2)?;
        let (format, rest) = if with_format {
            (Some(frame[3]), &frame[4..])
        } else {
            (None, &frame[3..])
        };
        Ok(Self {
            opcode: frame[2],
            format,
            payload: rest.to_vec(),
        })
    }
}

/// A validated synchronous reply: `[tag][len][status][data]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u8,
    pub data: Vec<u8>,
}

impl Reply {
    /// Check tag and declared length; the status byte is interpreted later.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < 3 {
            return Err(PanelError::FrameTooShort { len: frame.len() });
        }
        if frame[0] != TAG_SYNC {
            return Err(PanelError::InvalidProtocol { tag: frame[0] });
        }
        check_declared(frame[1] as usize, frame.len() - 2)?;
        Ok(Self {
            status: frame[2],
            data: frame[3..].to_vec(),
        })
    }

    /// Encode a reply frame (used by fake panels in tests and demos).
    pub fn encode(status: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(data.len() + 3);
        frame.push(TAG_SYNC);
        frame.push((data.len() + 1) as u8);
        frame.push(status);
        frame.extend_from_slice(data);
        frame
    }

    fn rejection(&self) -> PanelError {
        match self.status {
            STATUS_NACK => PanelError::Nack(NackReason::from_code(
                self.data.first().copied().unwrap_or(0),
            )),
            STATUS_ACK | STATUS_DATA => PanelError::UnexpectedStatus {
                expected: if self.status == STATUS_ACK { STATUS_DATA } else { STATUS_ACK },
                actual: self.status,
            },
            other => PanelError::UndefinedReply { status: other },
        }
    }

    /// Require "success with data".
    pub fn into_data(self) -> Result<Vec<u8>> {
        if self.status == STATUS_DATA {
            Ok(self.data)
        } else {
            Err(self.rejection())
        }
    }

    /// Require "success, ack only".
    pub fn into_ack(self) -> Result<()> {
        if self.status == STATUS_ACK {
            Ok(())
        } else {
            Err(self.rejection())
        }
    }

    /// Accept either success code; an ack yields empty data.
    pub fn into_optional_data(self) -> Result<Vec<u8>> {
        match self.status {
            STATUS_DATA => Ok(self.data),
            STATUS_ACK => Ok(Vec::new()),
            _ => Err(self.rejection()),
        }
    }
}

fn check_declared(declared: usize, actual: usize) -> Result<()> {
    if declared != actual {
        return Err(PanelError::LengthMismatch { declared, actual });
    }
    Ok(())
}

fn numbers_to_bytes(numbers: &[u16]) -> Vec<u8> {
    numbers.iter().flat_map(|n| n.to_be_bytes()).collect()
}

/// Unit numbers (1-based) whose bit is set. Unit `n` lives at byte `(n-1)/8`,
/// bit `7-(n-1)%8`.
pub fn decode_bitmask(mask: &[u8]) -> Vec<u16> {
    let mut units = Vec::new();
    for (i, byte) in mask.iter().enumerate() {
        for bit in 0..8 {
            if byte & (0x80 >> bit) != 0 {
                units.push((i * 8 + bit + 1) as u16);
            }
        }
    }
    units
}

/// Inverse of [`decode_bitmask`], `len` bytes wide. Units outside the mask are
/// rejected.
pub fn encode_bitmask(units: &[u16], len: usize) -> Result<Vec<u8>> {
    let mut mask = vec![0u8; len];
    for &n in units {
        let idx = usize::from(n);
        if n == 0 || idx > len * 8 {
            return Err(PanelError::InvalidUnit { kind: "area", number: n });
        }
        mask[(idx - 1) / 8] |= 0x80 >> ((idx - 1) % 8);
    }
    Ok(mask)
}

/// Space-pad an automation passcode to the fixed 24-byte field.
pub fn pad_passcode(passcode: &str) -> Result<Vec<u8>> {
    let len = passcode.len();
    if !(PASSCODE_MIN_LEN..=PASSCODE_MAX_LEN).contains(&len) {
        return Err(PanelError::CredentialLength {
            len,
            min: PASSCODE_MIN_LEN,
            max: PASSCODE_MAX_LEN,
        });
    }
    let mut field = passcode.as_bytes().to_vec();
    field.resize(PASSCODE_MAX_LEN, b' ');
    Ok(field)
}

/// Pack a 3-8 digit code two digits per byte, high nibble first, padding
/// unused nibbles with 0xF.
pub fn pack_remote_code(code: &str) -> Result<[u8; 4]> {
    let len = code.len();
    if !(REMOTE_CODE_MIN_LEN..=REMOTE_CODE_MAX_LEN).contains(&len) {
        return Err(PanelError::CredentialLength {
            len,
            min: REMOTE_CODE_MIN_LEN,
            max: REMOTE_CODE_MAX_LEN,
        });
    }
    let mut nibbles = [0x0Fu8; 8];
    for (slot, c) in nibbles.iter_mut().zip(code.chars()) {
        *slot = c.to_digit(10).ok_or(PanelError::CredentialFormat)? as u8;
    }
    let mut packed = [0u8; 4];
    for (i, byte) in packed.iter_mut().enumerate() {
        *byte = (nibbles[i * 2] << 4) | nibbles[i * 2 + 1];
    }
    Ok(packed)
}

/// Read a NUL-terminated string; returns the text and the bytes consumed
/// (including the terminator when present).
pub fn read_nul_text(data: &[u8]) -> (String, usize) {
    match data.iter().position(|b| *b == 0) {
        Some(end) => (String::from_utf8_lossy(&data[..end]).trim().to_string(), end + 1),
        None => (String::from_utf8_lossy(data).trim().to_string(), data.len()),
    }
}

/// Parse a paged text reply: repeated `number(2) text NUL`.
pub fn parse_text_page(command: u8, data: &[u8]) -> Result<Vec<(u16, String)>> {
    let mut entries = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        if rest.len() < 2 {
            return Err(PanelError::MalformedReply {
                command,
                details: format!("{} trailing byte(s) in text page", rest.len()),
            });
        }
        let number = u16::from_be_bytes([rest[0], rest[1]]);
        let (text, used) = read_nul_text(&rest[2..]);
        entries.push((number, text));
        rest = &rest[2 + used..];
    }
    Ok(entries)
}

/// Parse repeating `number(2) status(1)` triples.
pub fn parse_status_triples(command: u8, data: &[u8]) -> Result<Vec<(u16, u8)>> {
    if data.len() % 3 != 0 {
        return Err(PanelError::MalformedReply {
            command,
            details: format!("status reply of {} bytes is not a multiple of 3", data.len()),
        });
    }
    Ok(data
        .chunks_exact(3)
        .map(|c| (u16::from_be_bytes([c[0], c[1]]), c[2]))
        .collect())
}
