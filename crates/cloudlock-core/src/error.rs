use thiserror::Error;

/// Error taxonomy shared by every Cloudlock crate.
///
/// The variants map one-to-one onto the failure classes the system
/// distinguishes at operation boundaries:
///
/// - `Transport` - the cloud call produced no usable response (connection
///   failure, timeout, non-success HTTP status).
/// - `Vendor` - a response arrived but the decoded body carries a
///   vendor-level error payload or an unexpected shape.
/// - `Config` - a configured identifier is unusable and requires an
///   operator edit; startup halts instead of guessing.
/// - `AuthRequired` - the session token is missing or rejected and only
///   the manual browser-based recovery flow can produce a new one.
/// - `Persistence` - the token file could not be read or written. Never
///   fatal: the process continues with an in-memory token.
#[derive(Error, Debug)]
pub enum Error {
    // Cloud call errors
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("vendor error: {0}")]
    Vendor(String),

    // Identifier errors
    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("invalid terminal id: {0}")]
    InvalidTerminalId(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Session errors
    #[error("authentication required: {0}")]
    AuthRequired(String),

    // Token file errors
    #[error("token persistence failed: {0}")]
    Persistence(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
