use crate::account::AccountSession;
use crate::outcome::{AuthLinkReply, LoginOutcome, ProfileDevice, ProfileReply, RefreshReply};
use crate::token_store::TokenStore;
use cloudlock_core::constants::{
    MAX_REFRESH_FAILURES, PATH_ACCOUNT_LOGIN, PATH_DEVICE_PROFILE, PATH_OAUTH_LOGIN,
    PATH_REFRESH_TOKEN, TOKEN_REFRESH_PERIOD,
};
use cloudlock_core::types::TerminalId;
use cloudlock_core::{Error, Result};
use cloudlock_transport::{CloudClient, Method};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Log a failed cloud call without dumping vendor payloads at error
/// level; the full payload is only visible when debug logging is on.
fn log_call_failure(operation: &str, err: &Error) {
    match err {
        Error::Vendor(payload) => {
            error!("{operation} failed: vendor rejected the request");
            debug!(%payload, "{operation} vendor error payload");
        }
        other => error!("{operation} failed: {other}"),
    }
}

/// Readiness of the account session.
///
/// ```text
/// Uninitialized -> AwaitingManualToken
/// Uninitialized -> Authenticated <-> Refreshing
/// Authenticated -> AwaitingManualToken
/// ```
///
/// `AwaitingManualToken` is terminal for the running process - the
/// operator writes a fresh token to the store and restarts - but the
/// same record re-enters `Uninitialized` on the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, no login attempted yet.
    Uninitialized,
    /// Automated authentication is impossible; operator action required.
    AwaitingManualToken,
    /// The vendor accepted the current token.
    Authenticated,
    /// A refresh call is in flight.
    Refreshing,
}

/// Owner of the account/session record.
///
/// The record is shared with every device controller through an
/// explicitly passed `Arc<SessionManager>`; the mutable token lives
/// behind an `RwLock` and controllers take a snapshot per call.
/// Last-write-wins: a call issued with a token about to be replaced by
/// an in-flight refresh may fail once and recovers on the next poll
/// cycle - nothing blocks on the refresh's completion.
pub struct SessionManager {
    client: CloudClient,
    store: TokenStore,
    account: RwLock<AccountSession>,
    state: RwLock<SessionState>,
    consecutive_failures: AtomicU32,
}

impl SessionManager {
    /// Build the session record from configured identity fields plus the
    /// persisted token (bootstrapping the token file if absent).
    pub fn new(
        client: CloudClient,
        store: TokenStore,
        login_id: &str,
        terminal_id: &TerminalId,
    ) -> Self {
        let token = store.load_or_create();
        let account = AccountSession::new(login_id, terminal_id, token);
        Self {
            client,
            store,
            account: RwLock::new(account),
            state: RwLock::new(SessionState::Uninitialized),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Clone of the account record as of now, for use as a request
    /// envelope. Whatever token is current at call time is what goes out.
    pub async fn account_snapshot(&self) -> AccountSession {
        self.account.read().await.clone()
    }

    /// Current session readiness.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn enter_state(&self, next: SessionState) {
        *self.state.write().await = next;
    }

    /// Log in with the current session token.
    ///
    /// The vendor signals success by a response body that decodes to
    /// null; any non-null body is a rejection. Never raises past this
    /// boundary: resolves to a boolean, side-effect-free on failure
    /// besides logging.
    pub async fn login(&self) -> bool {
        debug!("logging in with the persisted session token");
        let account = self.account_snapshot().await;

        let body = match self
            .client
            .send(Method::PUT, PATH_ACCOUNT_LOGIN, &account, &[])
            .await
        {
            Ok(body) => body,
            Err(err) => {
                log_call_failure("login with session token", &err);
                return false;
            }
        };

        match LoginOutcome::from_body(&body) {
            LoginOutcome::Accepted => {
                debug!("login succeeded");
                self.enter_state(SessionState::Authenticated).await;
                true
            }
            LoginOutcome::Rejected(payload) => {
                error!("login with session token rejected");
                debug!(%payload, "login rejection payload");
                false
            }
        }
    }

    /// Exchange the current token for a fresh one, persisting it on
    /// success.
    ///
    /// The store is written before the in-memory token mutates, so a
    /// failure of any kind (transport, vendor, write) leaves the
    /// in-memory record untouched and returns false.
    pub async fn refresh(&self) -> bool {
        debug!("refreshing the session token");
        self.enter_state(SessionState::Refreshing).await;
        let account = self.account_snapshot().await;

        let body = match self
            .client
            .send(Method::POST, PATH_REFRESH_TOKEN, &account, &[])
            .await
        {
            Ok(body) => body,
            Err(err) => {
                log_call_failure("token refresh", &err);
                self.enter_state(SessionState::Authenticated).await;
                return false;
            }
        };

        let reply: RefreshReply = match serde_json::from_value(body) {
            Ok(reply) => reply,
            Err(err) => {
                error!("token refresh reply was not decodable: {err}");
                self.enter_state(SessionState::Authenticated).await;
                return false;
            }
        };

        if let Err(err) = self.store.save(&reply.access_token) {
            error!("refreshed token could not be persisted: {err}");
            self.enter_state(SessionState::Authenticated).await;
            return false;
        }

        self.account.write().await.sso_token = reply.access_token;
        self.enter_state(SessionState::Authenticated).await;
        debug!("session token refreshed");
        true
    }

    /// Record the resolved outcome of a refresh attempt.
    ///
    /// A single success resets the counter to zero; failures accumulate.
    pub fn record_refresh_outcome(&self, succeeded: bool) {
        if succeeded {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        } else {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether the scheduler should still attempt an automatic refresh.
    ///
    /// The upstream issuer enforces a roughly one-hour token lifetime;
    /// past six consecutive failures the token is long dead and further
    /// ten-minute retries cannot help.
    #[must_use]
    pub fn should_attempt_refresh(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) < MAX_REFRESH_FAILURES
    }

    /// Consecutive refresh failures recorded so far.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Spawn the background refresh loop.
    ///
    /// Runs every ten minutes for the process lifetime. Once the failure
    /// cap is reached the loop keeps ticking but stops calling the
    /// vendor until a success (from any path) resets the counter.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TOKEN_REFRESH_PERIOD);
            // the session just authenticated; first refresh is one full period out
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !manager.should_attempt_refresh() {
                    debug!(
                        failures = manager.failure_count(),
                        "automatic token refresh suppressed; manual recovery required"
                    );
                    continue;
                }
                let succeeded = manager.refresh().await;
                manager.record_refresh_outcome(succeeded);
                if !succeeded && !manager.should_attempt_refresh() {
                    warn!(
                        "token refresh failed {MAX_REFRESH_FAILURES} times in a row; \
                         giving up until restart - follow the manual recovery instructions"
                    );
                    manager.enter_state(SessionState::AwaitingManualToken).await;
                }
            }
        })
    }

    /// Fetch the linked device roster and print the ids the operator must
    /// copy into the configuration.
    ///
    /// Called when any configured device id or the terminal id is still
    /// the discovery sentinel. Startup terminates after this; the system
    /// never proceeds with guessed identifiers.
    ///
    /// # Errors
    /// Propagates transport/vendor failures so the caller can halt
    /// startup with context.
    pub async fn resolve_profile(&self) -> Result<Vec<ProfileDevice>> {
        debug!("fetching the linked device roster");
        let account = self.account_snapshot().await;

        let body = self
            .client
            .send(Method::POST, PATH_DEVICE_PROFILE, &account, &[])
            .await?;

        let reply: ProfileReply = serde_json::from_value(body)
            .map_err(|err| Error::Vendor(format!("undecodable profile reply: {err}")))?;

        warn!("add the following device and terminal ids to the configuration, then restart");
        for (index, device) in reply.devices.iter().enumerate() {
            info!("device {}:", index + 1);
            info!("  device id:   {}", device.short_id());
            info!("  terminal id: {}", device.system_id);
        }

        Ok(reply.devices)
    }

    /// Fetch a one-time browser authentication link and print the manual
    /// recovery instructions.
    ///
    /// This is a terminal degraded state requiring human action; the
    /// system does not poll for completion.
    ///
    /// # Errors
    /// Returns `Error::Vendor` if the reply carries no provider link, or
    /// a transport error if the call itself fails.
    pub async fn request_manual_token(&self) -> Result<String> {
        let account = self.account_snapshot().await;

        let body = self
            .client
            .send(Method::GET, PATH_OAUTH_LOGIN, &account, &[])
            .await?;

        let reply: AuthLinkReply = serde_json::from_value(body)
            .map_err(|err| Error::Vendor(format!("undecodable auth link reply: {err}")))?;

        let link = reply
            .providers
            .first()
            .map(|p| p.link.clone())
            .ok_or_else(|| Error::Vendor("auth link reply carried no providers".to_string()))?;

        self.enter_state(SessionState::AwaitingManualToken).await;

        info!("authentication URL:");
        warn!("{link}");
        info!("open the link in a web browser and sign in with the account linked to the vendor app");
        info!(
            "after signing in, open the developer tools and search the page source for \
             \"access_token\"; the token starts with \"ya29\""
        );
        info!(
            "paste the token into {} (replacing any existing content), then restart",
            self.store.path().display()
        );

        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlock_transport::CloudConfig;
    use mockito::{Server, ServerGuard};
    use std::time::Duration;

    const TERMINAL: &str = "AABBCCDDEE99";

    fn manager_for(server: &ServerGuard, token_path: &std::path::Path) -> SessionManager {
        let client = CloudClient::new(CloudConfig {
            base_url: server.url(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let store = TokenStore::new(token_path);
        let terminal = TerminalId::new(TERMINAL).unwrap();
        SessionManager::new(client, store, "user@example.com", &terminal)
    }

    #[tokio::test]
    async fn login_succeeds_on_null_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v1/accounts/login/put")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        assert!(manager.login().await);
        assert_eq!(manager.state().await, SessionState::Authenticated);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_fails_on_any_non_null_body() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/v1/accounts/login/put")
            .with_status(200)
            .with_body(r#"{"reason":"token rejected"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        assert!(!manager.login().await);
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn refresh_persists_then_mutates() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/oauth/refresh_token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.fresh"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "ya29.stale").unwrap();
        let manager = manager_for(&server, &path);

        assert!(manager.refresh().await);
        assert_eq!(manager.account_snapshot().await.sso_token, "ya29.fresh");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ya29.fresh");
        assert_eq!(manager.state().await, SessionState::Authenticated);
    }

    #[tokio::test]
    async fn failed_refresh_leaves_token_untouched() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/oauth/refresh_token")
            .with_status(200)
            .with_body(r#"{"error":{"message":"expired"}}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "ya29.stale").unwrap();
        let manager = manager_for(&server, &path);

        assert!(!manager.refresh().await);
        assert_eq!(manager.account_snapshot().await.sso_token, "ya29.stale");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ya29.stale");
    }

    #[tokio::test]
    async fn undecodable_refresh_reply_is_a_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/oauth/refresh_token")
            .with_status(200)
            .with_body(r#"{"unexpected":"shape"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));
        assert!(!manager.refresh().await);
    }

    #[tokio::test]
    async fn failure_counter_gates_after_six_and_resets_on_success() {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        for i in 1..=6 {
            assert!(manager.should_attempt_refresh(), "gate closed early at {i}");
            manager.record_refresh_outcome(false);
        }
        assert_eq!(manager.failure_count(), 6);
        assert!(!manager.should_attempt_refresh());

        // one real success reopens the gate
        manager.record_refresh_outcome(true);
        assert_eq!(manager.failure_count(), 0);
        assert!(manager.should_attempt_refresh());
    }

    #[tokio::test]
    async fn resolve_profile_decodes_the_roster() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/profile/get")
            .with_status(200)
            .with_body(
                r#"{"devices":[
                    {"device_id":"IREVOLOCK-FFFFFFFF0002_BD-0004A3C29F01","system_id":"AABBCCDDEE99"}
                ]}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        let devices = manager.resolve_profile().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].short_id(), "0004A3C29F01");
        assert_eq!(devices[0].system_id, "AABBCCDDEE99");
    }

    #[tokio::test]
    async fn manual_token_flow_surfaces_the_link_and_degrades_the_state() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/oauth/login")
            .match_query(mockito::Matcher::UrlEncoded(
                "target".into(),
                "default".into(),
            ))
            .with_status(200)
            .with_body(r#"{"providers":[{"link":"https://accounts.example/o/oauth2/auth"}]}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        let link = manager.request_manual_token().await.unwrap();
        assert_eq!(link, "https://accounts.example/o/oauth2/auth");
        assert_eq!(manager.state().await, SessionState::AwaitingManualToken);
    }

    #[tokio::test]
    async fn manual_token_flow_without_providers_is_a_vendor_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/oauth/login")
            .match_query(mockito::Matcher::UrlEncoded(
                "target".into(),
                "default".into(),
            ))
            .with_status(200)
            .with_body(r#"{"providers":[]}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&server, &dir.path().join("token"));

        assert!(matches!(
            manager.request_manual_token().await,
            Err(Error::Vendor(_))
        ));
    }
}
