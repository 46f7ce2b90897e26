//! Protocol and scheduling constants for the Cloudlock bridge.
//!
//! Everything vendor-specific lives here: the frame opcodes and operands,
//! the bridge addressing prefix, the cloud API surface, and the timer
//! periods that drive the session and controller loops. Changing these
//! values breaks compatibility with the vendor cloud.
//!
//! # Frame layout
//!
//! A command code is a contiguous uppercase hex string:
//!
//! ```text
//! 74A0 3F 02B11000
//! ^^^^ ^^ ^^^^^^^^
//! op   nonce operand
//! ```
//!
//! The one-byte nonce is random per frame and only used by the device for
//! request/response correlation.

use std::time::Duration;

// ============================================================================
// Identifiers
// ============================================================================

/// Sentinel for an unknown device or terminal id ("must be discovered").
pub const SENTINEL_ID: &str = "FFFFFFFFFFFF";

/// Canonical identifier length in hex characters.
pub const ID_HEX_LEN: usize = 12;

/// Fixed vendor prefix the bridge addressing scheme requires in front of
/// every canonical device id.
pub const BRIDGE_ADDRESS_PREFIX: &str = "IREVOLOCK-FFFFFFFF0002_BD-";

// ============================================================================
// Frame opcodes and operands
// ============================================================================

/// Opcode of the bridge-connect frame.
pub const OPCODE_CONNECT: &str = "74A0";

/// Operand of the bridge-connect frame.
pub const OPERAND_CONNECT: &str = "02B11000";

/// Opcode of the status-query frame.
pub const OPCODE_QUERY_STATUS: &str = "11A0";

/// Operand of the status-query frame.
pub const OPERAND_QUERY_STATUS: &str = "0000";

/// Opcode of the set-state frame.
pub const OPCODE_SET_STATE: &str = "10A0";

/// Leading operand byte of the set-state frame.
pub const SET_STATE_PREFIX: &str = "01";

/// Trailing operand byte of the set-state frame.
pub const SET_STATE_SUFFIX: &str = "00";

/// Set-state op byte: drive the bolt closed.
pub const OP_LOCK: &str = "FF";

/// Set-state op byte: drive the bolt open.
pub const OP_UNLOCK: &str = "00";

// ============================================================================
// Status decode
// ============================================================================

/// Offset of the two-character status code inside an echoed command payload.
pub const STATUS_CODE_OFFSET: usize = 8;

/// Length of the status code in hex characters.
pub const STATUS_CODE_LEN: usize = 2;

// ============================================================================
// Cloud API
// ============================================================================

/// Production base URL of the vendor cloud API.
pub const DEFAULT_BASE_URL: &str = "https://irevo.app.hura.center:18443/api";

/// Name of the fixed API version header sent on every request.
pub const API_VERSION_HEADER: &str = "X-HIT-Version";

/// Value of the fixed API version header.
pub const API_VERSION: &str = "1.0";

/// Fetch a one-time browser authentication link.
pub const PATH_OAUTH_LOGIN: &str = "/v1/oauth/login?target=default";

/// Log in with the current session token.
pub const PATH_ACCOUNT_LOGIN: &str = "/v1/accounts/login/put";

/// Fetch the linked device roster and terminal id.
pub const PATH_DEVICE_PROFILE: &str = "/v1/devices/profile/get";

/// Exchange the current token for a fresh one.
pub const PATH_REFRESH_TOKEN: &str = "/v1/oauth/refresh_token";

/// Connect / query / control a device through the bridge.
pub const PATH_DEVICE_CONTROL: &str = "/v1/devices/control/set";

// ============================================================================
// Timing
// ============================================================================

/// Timeout applied to every cloud call. A timeout is treated like any
/// other transport failure; retries are a caller concern.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Period of the background token refresh loop. The upstream issuer
/// enforces a roughly one-hour token lifetime, so ten minutes leaves
/// ample margin.
pub const TOKEN_REFRESH_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Consecutive refresh failures after which automatic attempts stop
/// until one succeeds.
pub const MAX_REFRESH_FAILURES: u32 = 6;

/// Period of the per-device bridge keep-alive loop (sole-terminal mode).
pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Delay after a successful set-state before current and target snap
/// back to secured, modeling the physical lock's auto-relock.
pub const AUTO_RELOCK_DELAY: Duration = Duration::from_secs(10);

/// Delay after a successful set-state before the cached lock target
/// resets to "lock".
pub const TARGET_RESET_DELAY: Duration = Duration::from_secs(1);
