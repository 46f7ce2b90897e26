//! Decoding of asynchronous device replies into the tri-state lock model.
//!
//! A single control channel carries echoed frames for every terminal
//! paired with the lock; only the entry whose terminal-id field matches
//! this controller is authoritative. Malformed entries are skipped, a
//! missing match leaves the state unknown, and nothing in this module
//! can fail.

use crate::frame::DeviceFrame;
use cloudlock_core::types::{LockState, TerminalId};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ControlReply {
    #[serde(default)]
    devices: Vec<Value>,
}

/// Scan a control reply body for the status echoed to `terminal_id`.
///
/// The status code sits at a fixed offset inside the echoed command
/// payload (`e[0].sv`); the issuing terminal rides in `e[1].sv`. Entries
/// that fail to decode, carry too few resource fields, or belong to a
/// different terminal are ignored. Among matching entries the last
/// definitive reading wins.
#[must_use]
pub fn decode_lock_status(body: &Value, terminal_id: &TerminalId) -> LockState {
    let Ok(reply) = serde_json::from_value::<ControlReply>(body.clone()) else {
        return LockState::Unknown;
    };

    let mut state = LockState::Unknown;
    for entry in reply.devices {
        let Ok(frame) = serde_json::from_value::<DeviceFrame>(entry) else {
            continue;
        };
        let e = &frame.msg.e;
        if e.len() < 2 || e[1].sv != terminal_id.as_str() {
            continue;
        }

        let decoded = LockState::from_echoed_payload(&e[0].sv);
        if decoded.is_definitive() {
            state = decoded;
        }
    }

    state
}
