//! Session and authentication management for the vendor cloud.
//!
//! One account, one terminal: this crate owns the account/session
//! record, persists the session token to a single-purpose local file,
//! performs login, profile discovery and scheduled refresh, and falls
//! back to a manual browser-based recovery flow when automated refresh
//! is impossible.

pub mod account;
pub mod manager;
pub mod outcome;
pub mod token_store;

pub use account::AccountSession;
pub use manager::{SessionManager, SessionState};
pub use outcome::{AuthLinkReply, LoginOutcome, ProfileDevice, RefreshReply};
pub use token_store::TokenStore;
