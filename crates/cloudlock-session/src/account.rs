use cloudlock_core::types::TerminalId;
use serde::Serialize;

/// Static application identity the vendor expects on every request.
const APP_ID: &str = "com.yale.blen";
const APP_TYPE: &str = "ios";
const LANGUAGE: &str = "zh-Hant";
const USER_ID_PROVIDER: &str = "google";

/// The account/session record sent as the `account` envelope on every
/// cloud call.
///
/// Constructed once at startup from the persisted token plus configured
/// fields. `sso_token` is the only field that ever mutates (the refresh
/// operation replaces it) and the only field that is persisted. An empty
/// token is sent as `""` - it is expected to fail login, which is itself
/// a valid state transition into manual recovery.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSession {
    pub app_id: String,
    pub terminal_id: String,
    pub sso_token: String,
    pub app_type: String,
    pub language: String,
    pub fcm_token: String,
    pub user_id: String,
}

impl AccountSession {
    /// Build the account record for a login id, terminal and token.
    ///
    /// The push-token field mirrors the terminal id; the vendor requires
    /// it to be present even though this integration never registers for
    /// push delivery.
    #[must_use]
    pub fn new(login_id: &str, terminal_id: &TerminalId, sso_token: String) -> Self {
        Self {
            app_id: APP_ID.to_string(),
            terminal_id: terminal_id.as_str().to_string(),
            sso_token,
            app_type: APP_TYPE.to_string(),
            language: LANGUAGE.to_string(),
            fcm_token: terminal_id.as_str().to_string(),
            user_id: format!("{login_id}/{USER_ID_PROVIDER}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fields_follow_the_vendor_shape() {
        let terminal = TerminalId::new("AABBCCDDEE99").unwrap();
        let account = AccountSession::new("user@example.com", &terminal, String::new());

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["app_id"], "com.yale.blen");
        assert_eq!(json["terminal_id"], "AABBCCDDEE99");
        assert_eq!(json["fcm_token"], "AABBCCDDEE99");
        assert_eq!(json["app_type"], "ios");
        assert_eq!(json["language"], "zh-Hant");
        assert_eq!(json["user_id"], "user@example.com/google");
        // empty token is serialized as "", never omitted
        assert_eq!(json["sso_token"], "");
    }

    #[test]
    fn sentinel_terminal_rides_through_unchanged() {
        let terminal = TerminalId::new("").unwrap();
        let account = AccountSession::new("user", &terminal, "tok".to_string());
        assert_eq!(account.terminal_id, "FFFFFFFFFFFF");
        assert_eq!(account.fcm_token, "FFFFFFFFFFFF");
    }
}
