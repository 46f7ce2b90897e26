use crate::controller::{ControllerConfig, DeviceController};
use cloudlock_core::types::{DeviceId, TerminalId};
use cloudlock_core::{Error, Result};
use cloudlock_session::{SessionManager, TokenStore};
use cloudlock_transport::{CloudClient, CloudConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// One configured lock.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    /// Display name, used only in log context.
    pub name: String,

    /// Device id in any accepted form; empty or sentinel triggers
    /// profile discovery.
    pub device_id: String,
}

/// Everything the host process hands to the core at startup.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Vendor account login id (without the provider suffix).
    pub login_id: String,

    /// Terminal id of this controller; empty means "discover".
    pub terminal_id: String,

    /// The configured locks, one controller each.
    pub devices: Vec<DeviceEntry>,

    /// This is the lock's only terminal: skip per-call bridge connects
    /// and keep the session warm on a timer instead.
    pub is_no_other_terminal: bool,

    /// Log every failure and full vendor payloads.
    pub verbose: bool,

    /// Path of the token file.
    pub token_path: PathBuf,

    /// Cloud endpoint configuration.
    pub cloud: CloudConfig,
}

/// The running core: a live session plus one controller per lock.
///
/// Startup initializes the session first; only once a usable session
/// exists are the controllers built and handed to the host layer.
/// Shutdown is owned by the host process - the background tasks run for
/// the process lifetime.
pub struct LockPlatform {
    session: Arc<SessionManager>,
    controllers: Vec<Arc<DeviceController>>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for LockPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockPlatform")
            .field("controllers", &self.controllers.len())
            .field("background_tasks", &self.background_tasks.len())
            .finish()
    }
}

impl LockPlatform {
    /// Bring the core up.
    ///
    /// The sequence mirrors the session readiness machine: load the
    /// persisted token, log in, canonicalize the configured ids, refresh
    /// once, then register controllers and the background loops.
    ///
    /// # Errors
    /// - `Error::AuthRequired` - login or the initial refresh failed;
    ///   the manual recovery instructions have been printed and the
    ///   operator must act before restarting.
    /// - `Error::Config` - a device or terminal id is missing or
    ///   unusable; the discovered ids (when reachable) have been printed
    ///   for the operator to copy into the configuration.
    /// - `Error::Transport` / `Error::Vendor` - profile discovery was
    ///   needed but the roster could not be fetched.
    pub async fn start(config: PlatformConfig) -> Result<Self> {
        let terminal_id = TerminalId::new(&config.terminal_id)?;
        let client = CloudClient::new(config.cloud.clone())?;
        let store = TokenStore::new(&config.token_path);
        let session = Arc::new(SessionManager::new(
            client.clone(),
            store,
            &config.login_id,
            &terminal_id,
        ));

        if !session.login().await {
            if let Err(err) = session.request_manual_token().await {
                error!("could not fetch the authentication link: {err}");
            }
            return Err(Error::AuthRequired(
                "login with the persisted token failed; follow the recovery instructions and restart"
                    .to_string(),
            ));
        }

        // Canonicalize the configured ids before any device traffic.
        let mut needs_profile = terminal_id.is_sentinel();
        let mut device_ids = Vec::new();
        for entry in &config.devices {
            if entry.device_id.trim().is_empty() {
                needs_profile = true;
                continue;
            }
            let id = DeviceId::new(&entry.device_id).map_err(|err| {
                Error::Config(format!(
                    "device '{}': {err}; fix the configured id and restart",
                    entry.name
                ))
            })?;
            if id.is_sentinel() {
                needs_profile = true;
                continue;
            }
            device_ids.push((entry.name.clone(), id));
        }

        if needs_profile {
            session.resolve_profile().await?;
            return Err(Error::Config(
                "device or terminal id not configured yet; copy the discovered ids and restart"
                    .to_string(),
            ));
        }

        if !session.refresh().await {
            if let Err(err) = session.request_manual_token().await {
                error!("could not fetch the authentication link: {err}");
            }
            return Err(Error::AuthRequired(
                "token refresh failed; follow the recovery instructions and restart".to_string(),
            ));
        }
        session.record_refresh_outcome(true);

        let mut background_tasks = vec![session.spawn_refresh_loop()];
        let mut controllers = Vec::new();
        for (name, device_id) in device_ids {
            info!(device = %device_id, name, "registering lock device");
            let controller = Arc::new(DeviceController::new(
                device_id,
                terminal_id.clone(),
                Arc::clone(&session),
                client.clone(),
                ControllerConfig {
                    sole_terminal: config.is_no_other_terminal,
                    verbose: config.verbose,
                    ..ControllerConfig::default()
                },
            ));

            // Initial bridge connect; a failure here is logged and the
            // next poll cycle retries.
            if !controller.connect_to_bridge().await {
                warn!(device = %controller.device_id(), "initial bridge connect failed");
            }

            if config.is_no_other_terminal {
                background_tasks.push(controller.spawn_keep_alive());
            }
            controllers.push(controller);
        }

        Ok(Self {
            session,
            controllers,
            background_tasks,
        })
    }

    /// The shared session handle.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// One controller per configured lock, in configuration order.
    #[must_use]
    pub fn controllers(&self) -> &[Arc<DeviceController>] {
        &self.controllers
    }

    /// Handles of the refresh and keep-alive loops.
    #[must_use]
    pub fn background_tasks(&self) -> &[JoinHandle<()>] {
        &self.background_tasks
    }
}
