//! Vendor frame codec for the Cloudlock bridge.
//!
//! This crate builds the wire payloads the vendor cloud relays to a lock
//! bridge, and decodes the asynchronous device replies that come back on
//! the same channel. It is pure construction and parsing; transport and
//! retry policy live elsewhere.

pub mod command;
pub mod frame;
pub mod status;

pub use command::{CommandKind, LockOp};
pub use frame::{DeviceFrame, Frame, WireEntry, WireMessage};
pub use status::decode_lock_status;
