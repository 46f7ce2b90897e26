use cloudlock_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Single-purpose persistence for the session token.
///
/// The file holds the raw bearer token as its entire contents - no
/// structured format. Absence is not an error: the store bootstraps an
/// empty file and the session proceeds with an empty token, which forces
/// the login-failure path into manual recovery. Read and write failures
/// are logged and non-fatal; the process then runs with an
/// in-memory-only token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file, for operator-facing instructions.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token, bootstrapping an empty file if absent.
    ///
    /// Any failure is reported as "no token": an empty string.
    #[must_use]
    pub fn load_or_create(&self) -> String {
        if self.path.exists() {
            match fs::read_to_string(&self.path) {
                Ok(contents) => contents.trim().to_string(),
                Err(err) => {
                    error!(
                        path = %self.path.display(),
                        "cannot read token file ({err}); check its contents or remove it to recreate"
                    );
                    String::new()
                }
            }
        } else {
            info!(path = %self.path.display(), "token file not found, creating an empty one");
            if let Err(err) = fs::write(&self.path, "") {
                error!(path = %self.path.display(), "cannot create token file: {err}");
            }
            String::new()
        }
    }

    /// Persist a freshly acquired token, replacing the file contents.
    ///
    /// # Errors
    /// Returns `Error::Persistence` if the file cannot be written; the
    /// caller decides whether to keep the in-memory token.
    pub fn save(&self, token: &str) -> Result<()> {
        fs::write(&self.path, token)?;
        debug!(path = %self.path.display(), "token file updated");
        Ok(())
    }
}
