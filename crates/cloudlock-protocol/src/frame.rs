use crate::command::CommandKind;
use cloudlock_core::constants::BRIDGE_ADDRESS_PREFIX;
use cloudlock_core::types::{DeviceId, TerminalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource path carrying the command code in a wire message.
pub const ENTRY_COMMAND: &str = "/100/0/0";

/// Resource path carrying the issuing terminal id in a wire message.
pub const ENTRY_TERMINAL: &str = "/100/0/2";

/// Wire operation marker for writes.
const MSG_OP_WRITE: &str = "w";

/// One `n`/`sv` resource entry inside a wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub n: String,
    pub sv: String,
}

/// The `msg` object of a device frame: an operation marker plus resource
/// entries. Replies echo the same shape back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub o: String,
    pub e: Vec<WireEntry>,
}

/// One vendor wire request (or echoed reply) addressed to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFrame {
    pub msg: WireMessage,
    pub device_id: String,
}

/// A lock-control frame: command code plus addressing, independent of
/// transport.
///
/// The command code is `opcode ++ nonce ++ operand`, all uppercase hex
/// with no separators. The nonce is one uniformly random byte per frame,
/// rendered as two uppercase hex characters; the device uses it for
/// request/response correlation, nothing more.
///
/// ```
/// use cloudlock_core::types::{DeviceId, TerminalId};
/// use cloudlock_protocol::{CommandKind, Frame};
///
/// let terminal = TerminalId::new("AABBCCDDEE99").unwrap();
/// let device = DeviceId::new("0004A3C29F01").unwrap();
/// let frame = Frame::build_with_nonce(CommandKind::Connect, 0x3F, &terminal, &device);
/// assert_eq!(frame.command_code(), "74A03F02B11000");
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    command_code: String,
    terminal_id: TerminalId,
    device_id: DeviceId,
}

impl Frame {
    /// Build a frame with a fresh random nonce.
    #[must_use]
    pub fn build(kind: CommandKind, terminal_id: &TerminalId, device_id: &DeviceId) -> Self {
        Self::build_with_nonce(kind, rand::random::<u8>(), terminal_id, device_id)
    }

    /// Build a frame with an explicit nonce byte.
    #[must_use]
    pub fn build_with_nonce(
        kind: CommandKind,
        nonce: u8,
        terminal_id: &TerminalId,
        device_id: &DeviceId,
    ) -> Self {
        let command_code = format!("{}{nonce:02X}{}", kind.opcode(), kind.operand());
        Frame {
            command_code,
            terminal_id: terminal_id.clone(),
            device_id: device_id.clone(),
        }
    }

    /// The full command code, uppercase hex.
    #[must_use]
    pub fn command_code(&self) -> &str {
        &self.command_code
    }

    /// The device address in the bridge's scheme: fixed vendor prefix plus
    /// the canonical device id.
    #[must_use]
    pub fn bridge_address(&self) -> String {
        format!("{BRIDGE_ADDRESS_PREFIX}{}", self.device_id)
    }

    /// Serialize into the vendor wire shape carried in a `devices` list.
    #[must_use]
    pub fn to_wire(&self) -> DeviceFrame {
        DeviceFrame {
            msg: WireMessage {
                o: MSG_OP_WRITE.to_string(),
                e: vec![
                    WireEntry {
                        n: ENTRY_COMMAND.to_string(),
                        sv: self.command_code.clone(),
                    },
                    WireEntry {
                        n: ENTRY_TERMINAL.to_string(),
                        sv: self.terminal_id.as_str().to_string(),
                    },
                ],
            },
            device_id: self.bridge_address(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[command={}, device={}]",
            self.command_code, self.device_id
        )
    }
}
