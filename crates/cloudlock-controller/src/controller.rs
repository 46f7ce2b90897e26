use crate::state::ControllerPhase;
use cloudlock_core::constants::{
    AUTO_RELOCK_DELAY, KEEP_ALIVE_PERIOD, PATH_DEVICE_CONTROL, TARGET_RESET_DELAY,
};
use cloudlock_core::types::{DeviceId, LockState, TerminalId};
use cloudlock_core::Error;
use cloudlock_protocol::{CommandKind, Frame, LockOp};
use cloudlock_session::SessionManager;
use cloudlock_transport::{CloudClient, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Per-controller behavior knobs.
///
/// The timer delays default to the physical lock's observed behavior;
/// tests shorten them.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// This controller is the lock's sole terminal: skip the redundant
    /// per-call bridge connect and keep the bridge session warm instead.
    pub sole_terminal: bool,

    /// Log every failure (and full vendor payloads) instead of only
    /// transitions into the error state.
    pub verbose: bool,

    /// Delay before current and target snap back to secured after a
    /// successful set-state.
    pub auto_relock_delay: Duration,

    /// Delay before the cached lock target resets to "lock".
    pub target_reset_delay: Duration,

    /// Period of the bridge keep-alive loop (sole-terminal mode only).
    pub keep_alive_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sole_terminal: false,
            verbose: false,
            auto_relock_delay: AUTO_RELOCK_DELAY,
            target_reset_delay: TARGET_RESET_DELAY,
            keep_alive_period: KEEP_ALIVE_PERIOD,
        }
    }
}

/// Mutable per-device state. Only this device's controller touches it.
#[derive(Debug)]
struct DeviceRuntimeState {
    /// Last intended/observed target ("should the bolt be closed").
    target_to_lock: bool,

    /// Deduplicates noisy error logging: log only on the transition
    /// into error, unless verbose mode is on.
    currently_errored: bool,

    /// Last state reported to the host layer.
    reported_current: LockState,

    phase: ControllerPhase,
}

/// The pending relock tasks armed by the last successful write.
#[derive(Debug, Default)]
struct RelockTimers {
    relock: Option<JoinHandle<()>>,
    target_reset: Option<JoinHandle<()>>,
}

/// Controller for one configured lock.
///
/// Uses the frame codec and cloud transport, gated by a live session,
/// to connect to the lock's bridge, poll status, and request
/// lock/unlock. Every cloud failure is caught at this boundary, logged
/// with context, and converted into a definitive negative or unknown
/// result - nothing propagates to the host layer as a fault.
pub struct DeviceController {
    device_id: DeviceId,
    terminal_id: TerminalId,
    session: Arc<SessionManager>,
    client: CloudClient,
    config: ControllerConfig,
    runtime: Mutex<DeviceRuntimeState>,
    timers: Mutex<RelockTimers>,
}

impl DeviceController {
    /// Create the controller for one lock. The session handle is shared
    /// read-mostly with every other controller; the runtime state is
    /// exclusively this device's.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        terminal_id: TerminalId,
        session: Arc<SessionManager>,
        client: CloudClient,
        config: ControllerConfig,
    ) -> Self {
        Self {
            device_id,
            terminal_id,
            session,
            client,
            config,
            runtime: Mutex::new(DeviceRuntimeState {
                target_to_lock: true,
                currently_errored: false,
                reported_current: LockState::Secured,
                phase: ControllerPhase::Idle,
            }),
            timers: Mutex::new(RelockTimers::default()),
        }
    }

    /// The canonical id of the controlled lock.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Liveness signal for the host layer: the last cloud call for this
    /// device succeeded.
    pub async fn is_online(&self) -> bool {
        !self.runtime.lock().await.currently_errored
    }

    /// Current control-flow phase, for introspection.
    pub async fn phase(&self) -> ControllerPhase {
        self.runtime.lock().await.phase
    }

    /// Cheap cached view of (current, target) as last reported to the
    /// host layer. No cloud traffic.
    pub async fn reported_state(&self) -> (LockState, LockState) {
        let rt = self.runtime.lock().await;
        let target = if rt.target_to_lock {
            LockState::Secured
        } else {
            LockState::Unsecured
        };
        (rt.reported_current, target)
    }

    async fn enter_phase(&self, next: ControllerPhase) {
        let mut rt = self.runtime.lock().await;
        if rt.phase == next {
            return;
        }
        if !rt.phase.can_transition_to(next) {
            trace!(device = %self.device_id, from = %rt.phase, to = %next, "phase override");
        }
        rt.phase = next;
    }

    /// Open a bridge session toward the lock.
    ///
    /// Returns true only if the transport call succeeds and the body
    /// carries no vendor error. Repeated identical failures log once.
    pub async fn connect_to_bridge(&self) -> bool {
        self.enter_phase(ControllerPhase::Connecting).await;
        let frame = Frame::build(CommandKind::Connect, &self.terminal_id, &self.device_id);
        let account = self.session.account_snapshot().await;

        match self
            .client
            .send(Method::POST, PATH_DEVICE_CONTROL, &account, &[frame.to_wire()])
            .await
        {
            Ok(_) => {
                self.log_recovery("connect to bridge").await;
                self.enter_phase(ControllerPhase::Connected).await;
                true
            }
            Err(err) => {
                self.log_failure("connect to bridge", &err).await;
                self.enter_phase(ControllerPhase::ConnectFailed).await;
                self.enter_phase(ControllerPhase::Idle).await;
                false
            }
        }
    }

    /// Query the lock's bolt status over an established bridge session.
    ///
    /// Returns `Unknown` on any failure or when the reply carries no
    /// authoritative entry for this terminal.
    pub async fn lock_status(&self) -> LockState {
        let frame = Frame::build(CommandKind::QueryStatus, &self.terminal_id, &self.device_id);
        let account = self.session.account_snapshot().await;

        match self
            .client
            .send(Method::POST, PATH_DEVICE_CONTROL, &account, &[frame.to_wire()])
            .await
        {
            Ok(body) => {
                let state = cloudlock_protocol::decode_lock_status(&body, &self.terminal_id);
                self.log_recovery("query lock status").await;
                trace!(device = %self.device_id, %state, "lock status decoded");
                state
            }
            Err(err) => {
                self.log_failure("query lock status", &err).await;
                LockState::Unknown
            }
        }
    }

    /// Read path exposed to the host layer.
    ///
    /// Optimistically mirrors the last known target as current, then -
    /// unless this controller is the lock's sole terminal, where a fresh
    /// connect is redundant - connects and queries. A definitive reading
    /// updates both current and target, self-correcting against drift
    /// caused by other terminals or physical key use. Anything short of
    /// definitive reports secured.
    pub async fn current_lock_state(&self) -> LockState {
        {
            let mut rt = self.runtime.lock().await;
            rt.reported_current = if rt.target_to_lock {
                LockState::Secured
            } else {
                LockState::Unsecured
            };
        }

        let connected = self.config.sole_terminal || self.connect_to_bridge().await;

        let mut reading = LockState::Unknown;
        if connected {
            self.enter_phase(ControllerPhase::Querying).await;
            reading = self.lock_status().await;
            if reading.is_definitive() {
                let mut rt = self.runtime.lock().await;
                rt.target_to_lock = reading == LockState::Secured;
                rt.reported_current = reading;
            }
        }
        self.enter_phase(ControllerPhase::Idle).await;

        reading.or_secured()
    }

    /// Write path exposed to the host layer.
    ///
    /// Connects (unless sole-terminal), sends the set-state frame, and
    /// on success immediately reports the current state as the requested
    /// target so the host UI reflects the action without waiting. The
    /// auto-relock tasks are then (re)armed: after the relock delay both
    /// current and target snap to secured, matching the physical lock;
    /// after the shorter reset delay the cached target returns to
    /// "lock". A newer write cancels and re-arms both.
    pub async fn set_target_state(self: &Arc<Self>, target: LockState) -> bool {
        let connected = self.config.sole_terminal || self.connect_to_bridge().await;
        if !connected {
            self.enter_phase(ControllerPhase::Idle).await;
            return false;
        }

        self.enter_phase(ControllerPhase::Setting).await;
        let op = LockOp::for_target(target);
        let frame = Frame::build(
            CommandKind::SetState(op),
            &self.terminal_id,
            &self.device_id,
        );
        let account = self.session.account_snapshot().await;

        match self
            .client
            .send(Method::POST, PATH_DEVICE_CONTROL, &account, &[frame.to_wire()])
            .await
        {
            Ok(_) => {
                self.log_recovery("set lock state").await;
                debug!(device = %self.device_id, "set device to {op}");
                {
                    let mut rt = self.runtime.lock().await;
                    rt.reported_current = op.target_state();
                    rt.target_to_lock = op == LockOp::Lock;
                }
                self.arm_relock_timers().await;
                self.enter_phase(ControllerPhase::AutoRelockPending).await;
                true
            }
            Err(err) => {
                self.log_failure("set lock state", &err).await;
                self.enter_phase(ControllerPhase::Idle).await;
                false
            }
        }
    }

    /// Abort any pending relock tasks and arm fresh ones.
    async fn arm_relock_timers(self: &Arc<Self>) {
        let mut timers = self.timers.lock().await;
        if let Some(handle) = timers.relock.take() {
            handle.abort();
        }
        if let Some(handle) = timers.target_reset.take() {
            handle.abort();
        }

        let controller = Arc::clone(self);
        timers.target_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(controller.config.target_reset_delay).await;
            controller.runtime.lock().await.target_to_lock = true;
        }));

        let controller = Arc::clone(self);
        timers.relock = Some(tokio::spawn(async move {
            tokio::time::sleep(controller.config.auto_relock_delay).await;
            let mut rt = controller.runtime.lock().await;
            rt.reported_current = LockState::Secured;
            rt.target_to_lock = true;
            if rt.phase == ControllerPhase::AutoRelockPending {
                rt.phase = ControllerPhase::Idle;
            }
            trace!(device = %controller.device_id, "auto-relock fired");
        }));
    }

    /// Keep the bridge session warm on a fixed period.
    ///
    /// Only useful in sole-terminal mode, where the per-call connect is
    /// skipped. The initial connect happens at registration; the first
    /// tick is one full period out.
    pub fn spawn_keep_alive(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.config.keep_alive_period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                controller.connect_to_bridge().await;
            }
        })
    }

    async fn log_failure(&self, operation: &str, err: &Error) {
        let first = {
            let mut rt = self.runtime.lock().await;
            let first = !rt.currently_errored;
            rt.currently_errored = true;
            first
        };

        if first || self.config.verbose {
            // full vendor payloads only in verbose mode
            let detail = match err {
                Error::Vendor(_) if !self.config.verbose => {
                    "vendor rejected the request".to_string()
                }
                other => other.to_string(),
            };
            error!(device = %self.device_id, "{operation} failed: {detail}");
        }
    }

    async fn log_recovery(&self, operation: &str) {
        let was_errored = {
            let mut rt = self.runtime.lock().await;
            let was = rt.currently_errored;
            rt.currently_errored = false;
            was
        };

        if was_errored || self.config.verbose {
            debug!(device = %self.device_id, "{operation} succeeded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlock_session::TokenStore;
    use cloudlock_transport::CloudConfig;
    use mockito::{Server, ServerGuard};

    const TERMINAL: &str = "AABBCCDDEE99";

    fn controller_for(server: &ServerGuard, config: ControllerConfig) -> Arc<DeviceController> {
        let client = CloudClient::new(CloudConfig {
            base_url: server.url(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token"));
        let terminal = TerminalId::new(TERMINAL).unwrap();
        let session = Arc::new(SessionManager::new(
            client.clone(),
            store,
            "user@example.com",
            &terminal,
        ));
        Arc::new(DeviceController::new(
            DeviceId::new("0004A3C29F01").unwrap(),
            terminal,
            session,
            client,
            config,
        ))
    }

    fn status_reply(code: &str) -> String {
        format!(
            r#"{{"devices":[{{"msg":{{"o":"w","e":[
                {{"n":"/100/0/0","sv":"11A03F01{code}00"}},
                {{"n":"/100/0/2","sv":"{TERMINAL}"}}
            ]}},"device_id":"IREVOLOCK-FFFFFFFF0002_BD-0004A3C29F01"}}]}}"#
        )
    }

    #[tokio::test]
    async fn connect_success_marks_the_device_online() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(r#"{"devices":[]}"#)
            .create_async()
            .await;

        let controller = controller_for(&server, ControllerConfig::default());
        assert!(controller.connect_to_bridge().await);
        assert!(controller.is_online().await);
        assert_eq!(controller.phase().await, ControllerPhase::Connected);
    }

    #[tokio::test]
    async fn connect_vendor_error_flags_the_device_errored() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(r#"{"error":{"message":"bridge offline"}}"#)
            .create_async()
            .await;

        let controller = controller_for(&server, ControllerConfig::default());
        assert!(!controller.connect_to_bridge().await);
        assert!(!controller.is_online().await);
        assert_eq!(controller.phase().await, ControllerPhase::Idle);
    }

    #[tokio::test]
    async fn read_path_reports_a_definitive_unsecured_reading() {
        let mut server = Server::new_async().await;
        // serves both the connect and the status query; only the query
        // inspects the echoed devices list
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(status_reply("00"))
            .expect(2)
            .create_async()
            .await;

        let controller = controller_for(&server, ControllerConfig::default());
        let state = controller.current_lock_state().await;

        assert_eq!(state, LockState::Unsecured);
        // a definitive reading self-corrects both halves
        let (current, target) = controller.reported_state().await;
        assert_eq!(current, LockState::Unsecured);
        assert_eq!(target, LockState::Unsecured);
    }

    #[tokio::test]
    async fn read_path_fails_safe_to_secured() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let controller = controller_for(&server, ControllerConfig::default());
        assert_eq!(controller.current_lock_state().await, LockState::Secured);
        assert!(!controller.is_online().await);
    }

    #[tokio::test]
    async fn sole_terminal_mode_skips_the_connect_call() {
        let mut server = Server::new_async().await;
        // exactly one call: the status query, no connect
        let mock = server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(status_reply("FF"))
            .expect(1)
            .create_async()
            .await;

        let config = ControllerConfig {
            sole_terminal: true,
            ..ControllerConfig::default()
        };
        let controller = controller_for(&server, config);
        assert_eq!(controller.current_lock_state().await, LockState::Secured);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_status_reading_does_not_disturb_the_cached_target() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(status_reply("9C")) // unmapped code
            .create_async()
            .await;

        let config = ControllerConfig {
            sole_terminal: true,
            ..ControllerConfig::default()
        };
        let controller = controller_for(&server, config);
        assert_eq!(controller.current_lock_state().await, LockState::Secured);
        let (_, target) = controller.reported_state().await;
        assert_eq!(target, LockState::Secured);
    }

    #[tokio::test]
    async fn failed_set_returns_false_and_reports_no_change() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/devices/control/set")
            .with_status(200)
            .with_body(r#"{"error":{"message":"bridge offline"}}"#)
            .create_async()
            .await;

        let controller = controller_for(&server, ControllerConfig::default());
        assert!(!controller.set_target_state(LockState::Unsecured).await);
        let (current, _) = controller.reported_state().await;
        assert_eq!(current, LockState::Secured);
    }
}
