//! Typed decodings of the vendor's per-call response bodies.
//!
//! Each session call gets its own tagged result instead of probing a
//! loosely-typed object at the call site.

use serde::Deserialize;
use serde_json::Value;

/// Result of the login call.
///
/// The vendor signals success by a body that decodes to `null`; any
/// non-null body, including an explicit error object, is a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Body decoded to null: the session token was accepted.
    Accepted,
    /// Any other body: the token was rejected.
    Rejected(String),
}

impl LoginOutcome {
    /// Classify a decoded login response body.
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        if body.is_null() {
            LoginOutcome::Accepted
        } else {
            LoginOutcome::Rejected(body.to_string())
        }
    }
}

/// Successful refresh body: the replacement bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshReply {
    pub access_token: String,
}

/// One device in the linked-device roster.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDevice {
    pub device_id: String,
    pub system_id: String,
}

impl ProfileDevice {
    /// The configurable device id: the tail segment of the vendor's
    /// bridge-addressed identifier.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.device_id.rsplit('-').next().unwrap_or(&self.device_id)
    }
}

/// Roster reply from the profile call.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileReply {
    #[serde(default)]
    pub devices: Vec<ProfileDevice>,
}

/// One authentication provider in the manual-recovery reply.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthProvider {
    pub link: String,
}

/// Reply carrying the one-time browser authentication link.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthLinkReply {
    #[serde(default)]
    pub providers: Vec<AuthProvider>,
}
