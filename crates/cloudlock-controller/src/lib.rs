//! Per-device lock control on top of the cloud session.
//!
//! Each configured lock gets one [`DeviceController`]: a small state
//! machine that connects to the lock's bridge, polls status, requests
//! lock/unlock, and schedules the optimistic auto-relock. The
//! [`platform::LockPlatform`] wires session readiness to the
//! controllers at startup.

pub mod controller;
pub mod platform;
pub mod state;

pub use controller::{ControllerConfig, DeviceController};
pub use platform::{DeviceEntry, LockPlatform, PlatformConfig};
pub use state::ControllerPhase;
