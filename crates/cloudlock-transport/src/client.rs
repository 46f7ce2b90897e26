use cloudlock_core::constants::{
    API_VERSION, API_VERSION_HEADER, DEFAULT_BASE_URL, REQUEST_TIMEOUT,
};
use cloudlock_core::{Error, Result};
use cloudlock_protocol::DeviceFrame;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Configuration for the cloud client.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the vendor API, without a trailing slash.
    pub base_url: String,

    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Request body: the account envelope plus an optional frame list.
///
/// Session calls carry only the account; device control calls add the
/// `devices` list. The key is omitted entirely when no frames are sent.
#[derive(Serialize)]
struct Envelope<'a, A: Serialize> {
    account: &'a A,
    #[serde(skip_serializing_if = "Option::is_none")]
    devices: Option<&'a [DeviceFrame]>,
}

/// Stateless client for the vendor cloud API.
///
/// Cheap to clone; all controllers and the session manager share one
/// underlying connection pool.
///
/// # Failure model
///
/// A call fails when the transport produces no response (connection
/// error or timeout), the HTTP status is not a success, or the decoded
/// body carries a vendor-level `error` field. Vendor error payloads ride
/// inside HTTP 200 responses too, so the body is always inspected.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
}

impl CloudClient {
    /// Create a client for the given configuration.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: CloudConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue one request carrying the account envelope and `frames`.
    ///
    /// Returns the decoded JSON body (which may be `null` - some calls
    /// signal success that way). One attempt, no retries, no logging.
    ///
    /// # Errors
    /// - `Error::Transport` - no response, timeout, non-success HTTP
    ///   status, or an undecodable body.
    /// - `Error::Vendor` - the body carries an `error` field.
    pub async fn send<A: Serialize>(
        &self,
        method: Method,
        path: &str,
        account: &A,
        frames: &[DeviceFrame],
    ) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let body = Envelope {
            account,
            devices: if frames.is_empty() {
                None
            } else {
                Some(frames)
            },
        };

        let response = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Transport("request timed out".to_string())
                } else {
                    Error::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP status {status}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("undecodable body: {e}")))?;

        if let Some(vendor_error) = value.get("error") {
            return Err(Error::Vendor(vendor_error.to_string()));
        }

        Ok(value)
    }
}
