// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

/// Frame tags (first byte of every frame).
pub const TAG_SYNC: u8 = 0x01; // Command / reply
pub const TAG_NOTIFICATION: u8 = 0x02; // Unsolicited push frame

/// Reply status bytes.
pub const STATUS_ACK: u8 = 0xFC; // Success, no data
pub const STATUS_NACK: u8 = 0xFD; // Rejected, reason code follows
pub const STATUS_DATA: u8 = 0xFE; // Success with data

/// Largest encoded command frame the panel accepts.
pub const MAX_FRAME_LEN: usize = 236;

/// Command opcodes.
pub mod cmd {
    pub const WHAT_ARE_YOU: u8 = 0x01;
    pub const TERMINATE_SESSION: u8 = 0x05;
    pub const PASSCODE: u8 = 0x06;
    pub const ALARM_MEMORY_SUMMARY: u8 = 0x08;
    pub const ALARM_MEMORY_DETAIL: u8 = 0x09;
    pub const PANEL_CAPACITIES: u8 = 0x1F;
    pub const CONFIGURED_AREAS: u8 = 0x24;
    pub const AREA_STATUS: u8 = 0x26;
    pub const ARM_AREAS: u8 = 0x27;
    pub const AREAS_NOT_READY: u8 = 0x28;
    pub const AREA_TEXT: u8 = 0x29;
    pub const CONFIGURED_OUTPUTS: u8 = 0x30;
    pub const OUTPUT_STATUS: u8 = 0x31;
    pub const SET_OUTPUT_STATE: u8 = 0x32;
    pub const OUTPUT_TEXT: u8 = 0x33;
    pub const POINTS_IN_AREA: u8 = 0x36;
    pub const POINT_STATUS: u8 = 0x38;
    pub const POINT_TEXT: u8 = 0x3C;
    pub const LOGIN_REMOTE_USER: u8 = 0x3E;
    pub const FIRMWARE_VERSION: u8 = 0x5B;
    pub const SET_SUBSCRIPTIONS: u8 = 0x5F;
}

/// Command format (dialect) bytes.
pub mod format {
    pub const CF01: u8 = 0x01;
    pub const CF02: u8 = 0x02;
    pub const CF03: u8 = 0x03;
}

/// Compiled-in unit ceilings. A panel reporting more is rejected.
pub const MAX_AREAS: u16 = 32;
pub const MAX_POINTS: u16 = 599;
pub const MAX_OUTPUTS: u16 = 599;

/// Per-request batch caps for status polling.
pub const POINT_STATUS_BATCH: usize = 66;
pub const AREA_STATUS_BATCH: usize = 50;

/// Upper bounds on "more data" walks.
pub const MAX_TEXT_PAGES: usize = 128;
pub const MAX_ALARM_PAGES: usize = 64;

/// Alarm detail "more pages" sentinel (area field).
pub const ALARM_DETAIL_MORE: u16 = 0xFFFF;

/// Passcode and remote-user code length bounds.
pub const PASSCODE_MIN_LEN: usize = 6;
pub const PASSCODE_MAX_LEN: usize = 24;
pub const REMOTE_CODE_MIN_LEN: usize = 3;
pub const REMOTE_CODE_MAX_LEN: usize = 8;

/// Number of alarm priorities reported by the summary.
pub const ALARM_PRIORITY_COUNT: usize = 10;

/// Notification status-item types.
pub mod item {
    pub const CONFIDENCE_HEARTBEAT: u8 = 0;
    pub const ALARM_SUMMARY: u8 = 1;
    pub const AREA_ON_OFF: u8 = 4;
    pub const AREA_READY: u8 = 5;
    pub const OUTPUT_STATE: u8 = 6;
    pub const POINT_STATE: u8 = 7;
    pub const PANEL_SYSTEM_STATUS: u8 = 10;
    pub const POINT_STATE_EXTENDED: u8 = 12;
}
