//! RR12 command line codec.
//!
//! Parses one line of timing-system input into a typed command and formats
//! typed responses into CRLF-terminated ASCII.

use chrono::{DateTime, Local};

/// Wire prefix of the protocol negotiation command. The `<=` is part of the
/// literal token syntax, not a comparison operator.
const SETPROTOCOL_PREFIX: &str = "SETPROTOCOL;<=";

/// Fixed telemetry tail of a GETSTATUS reply. The timing system expects the
/// full field set even though the bridge tracks none of it.
const STATUS_TAIL: &str = "1;10000000;1;1;;;1;100;0;0;0;;1;1;100;1;0;1;0;0;0;0;13.23";

/// One parsed line of timing-system input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    /// `SETPROTOCOL;<=<version>`. `None` when the version fragment is not numeric.
    SetProtocol(Option<f64>),
    /// `GETCONFIG;GENERAL;BOXNAME`
    GetConfigBoxName,
    /// `GO_LIVE`
    GoLive,
    /// `GETSTATUS`
    GetStatus,
    /// Anything else, kept verbatim for logging.
    Unrecognized(String),
}

/// Parse a trimmed input line into a command. Every line maps to exactly
/// one variant.
pub(crate) fn parse_command(line: &str) -> Command {
    if let Some(version) = line.strip_prefix(SETPROTOCOL_PREFIX) {
        return Command::SetProtocol(version.parse::<f64>().ok());
    }
    match line {
        "GETCONFIG;GENERAL;BOXNAME" => Command::GetConfigBoxName,
        "GO_LIVE" => Command::GoLive,
        "GETSTATUS" => Command::GetStatus,
        _ => Command::Unrecognized(line.to_string()),
    }
}

/// One formatted reply to the timing system.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Response {
    /// Negotiation succeeded; carries the configured version.
    ProtocolAccepted(f64),
    /// Requested version is below the configured one.
    UnsupportedProtocolVersion,
    /// Version fragment did not parse as a number.
    InvalidProtocolFormat,
    /// BOXNAME identification; carries the device ID.
    BoxName(String),
    /// Status snapshot at the given instant.
    Status(DateTime<Local>),
}

impl Response {
    /// Render as wire bytes (ASCII, CRLF-terminated).
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::ProtocolAccepted(version) => format!("SETPROTOCOL;{version}\r\n"),
            Response::UnsupportedProtocolVersion => "ERROR,Unsupported protocol version\r\n".to_string(),
            Response::InvalidProtocolFormat => "ERROR,Invalid protocol format\r\n".to_string(),
            Response::BoxName(device_id) => {
                format!("GETCONFIG;GENERAL;BOXNAME;Race Result Emulator;{device_id}\r\n")
            }
            Response::Status(at) => format!(
                "GETSTATUS;{};{};{STATUS_TAIL}\r\n",
                at.format("%Y-%m-%d"),
                at.format("%H:%M:%S%.3f"),
            ),
        }
        .into_bytes()
    }
}
