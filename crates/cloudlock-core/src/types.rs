use crate::{
    Result,
    constants::{ID_HEX_LEN, SENTINEL_ID, STATUS_CODE_LEN, STATUS_CODE_OFFSET},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical lock device identifier (12 uppercase hex characters).
///
/// Device ids reach the configuration in several historical forms: bare
/// 12-hex, UUID-hyphenated, or a UUID wrapper with the real id in its
/// tail. Construction normalizes all of them to the canonical form the
/// bridge addressing scheme expects: dashes stripped, uppercased, and if
/// the result is longer than 12 characters the last 12 are taken (the
/// leading prefix is a wrapper artifact, not part of the identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id, normalizing any accepted input form.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceId` if the normalized id is shorter
    /// than 12 characters or contains non-hex characters.
    pub fn new(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_uppercase();

        if !normalized.is_ascii() {
            return Err(Error::InvalidDeviceId(format!(
                "non-ASCII characters in '{raw}'"
            )));
        }

        if normalized.len() < ID_HEX_LEN {
            return Err(Error::InvalidDeviceId(format!(
                "expected at least {ID_HEX_LEN} hex chars, got {} in '{raw}'",
                normalized.len()
            )));
        }

        // Longer inputs are UUID wrappers; the identity is the tail.
        let canonical = &normalized[normalized.len() - ID_HEX_LEN..];

        if !canonical.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidDeviceId(format!(
                "non-hex characters in '{raw}'"
            )));
        }

        Ok(DeviceId(canonical.to_string()))
    }

    /// Get the canonical 12-hex id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the "unknown, must be discovered" sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_ID
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

/// Terminal identifier of this controller on the device bridge.
///
/// A single control channel carries frames for multiple terminals; only
/// the entry matching this id is authoritative when decoding status
/// replies. An empty configured value maps to the sentinel, which makes
/// startup run profile discovery instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalId(String);

impl TerminalId {
    /// Create a terminal id. Empty input maps to the discovery sentinel.
    ///
    /// # Errors
    /// Returns `Error::InvalidTerminalId` if the input is non-empty but
    /// not 12 hex characters.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(TerminalId(SENTINEL_ID.to_string()));
        }

        let normalized = trimmed.to_uppercase();
        if normalized.len() != ID_HEX_LEN
            || !normalized.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidTerminalId(format!(
                "expected {ID_HEX_LEN} hex chars, got '{raw}'"
            )));
        }

        Ok(TerminalId(normalized))
    }

    /// Get the terminal id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the terminal id is still the discovery sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_ID
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TerminalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TerminalId::new(s)
    }
}

/// Tri-state lock model.
///
/// `Unknown` is only ever held internally; every value reported to the
/// host layer collapses uncertainty to `Secured` (fail-safe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// No definitive reading available.
    Unknown,
    /// Bolt driven closed.
    Secured,
    /// Bolt driven open.
    Unsecured,
}

impl LockState {
    /// Map a two-character status code from an echoed payload.
    ///
    /// `"FF"` and `"12"` both report a closed bolt, `"00"` an open one;
    /// anything else leaves the state unknown.
    #[must_use]
    pub fn from_status_code(code: &str) -> Self {
        match code {
            "FF" | "12" => LockState::Secured,
            "00" => LockState::Unsecured,
            _ => LockState::Unknown,
        }
    }

    /// Extract and map the status code embedded in an echoed command
    /// payload. Returns `Unknown` for payloads too short to carry one.
    #[must_use]
    pub fn from_echoed_payload(payload: &str) -> Self {
        payload
            .get(STATUS_CODE_OFFSET..STATUS_CODE_OFFSET + STATUS_CODE_LEN)
            .map_or(LockState::Unknown, Self::from_status_code)
    }

    /// Returns `true` for a definitive reading (not `Unknown`).
    #[must_use]
    pub fn is_definitive(self) -> bool {
        !matches!(self, LockState::Unknown)
    }

    /// Collapse uncertainty to the fail-safe default.
    #[must_use]
    pub fn or_secured(self) -> Self {
        match self {
            LockState::Unknown => LockState::Secured,
            definitive => definitive,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LockState::Unknown => "Unknown",
            LockState::Secured => "Secured",
            LockState::Unsecured => "Unsecured",
        };
        write!(f, "{s}")
    }
}
