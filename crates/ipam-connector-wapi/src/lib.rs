// # Infoblox WAPI Connector
//
// This crate provides the `Connector` implementation that talks to an
// Infoblox NIOS grid master over its WAPI REST protocol.
//
// ## Behaviour
//
// - One HTTP request per connector call
// - Full error propagation to the caller (no retry, no backoff)
// - HTTP timeout configured (30 seconds by default)
// - Specific handling for HTTP status codes (400, 401, 403, 404, 5xx)
// - Dry-run mode: reads are performed, writes are only logged
// - Both `networkcontainer` and `ipv6networkcontainer` objects
//
// ## Security Requirements
//
// - The password NEVER appears in logs or `Debug` output
// - The connector fails fast if credentials are empty
//
// ## API Reference
//
// - Create: POST `/wapi/v<version>/<object type>` → `"<ref>"`
// - Read: GET `/wapi/v<version>/<ref>?_return_fields=...` → object
// - Update: PUT `/wapi/v<version>/<ref>` → `"<ref>"`
// - Delete: DELETE `/wapi/v<version>/<ref>` → `"<ref>"`
//
// Errors come back as `{"Error": ..., "code": ..., "text": ...}`.

use async_trait::async_trait;
use ipam_core::config::ConnectorConfig;
use ipam_core::model::{ObjectRef, ObjectType};
use ipam_core::traits::{Connector, ConnectorError, ConnectorFactory, ContainerFields};
use ipam_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested on every read
const RETURN_FIELDS: &str = "network_view,network,comment,extattrs";

/// Marker used in references handed out by dry-run creates
const DRY_RUN_MARKER: &str = "dry-run";

/// Infoblox WAPI connector
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the connector will:
/// - Perform all GET requests
/// - Log the intended POST, PUT and DELETE payloads
/// - **NOT** modify anything on the grid
///
/// A dry-run create returns a synthetic reference containing `dry-run`;
/// reading it back reports the object as not found.
///
/// # Security
///
/// The Debug implementation does NOT expose the password.
pub struct WapiConnector {
    /// `https://<host>/wapi/v<version>/`
    base_url: String,

    /// WAPI user
    username: String,

    /// WAPI password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for WapiConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WapiConnector")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Connection settings for [`WapiConnector::new`]
#[derive(Clone)]
pub struct WapiSettings {
    pub host: String,
    pub username: String,
    pub password: String,
    pub version: String,
    pub verify_tls: bool,
    pub timeout: Duration,
    pub dry_run: bool,
}

impl WapiConnector {
    /// Create a new WAPI connector
    ///
    /// Fails when the credentials are empty or the HTTP client cannot be
    /// built.
    pub fn new(settings: WapiSettings) -> Result<Self> {
        if settings.host.is_empty() {
            return Err(Error::config("WAPI host cannot be empty"));
        }
        if settings.username.is_empty() || settings.password.is_empty() {
            return Err(Error::config("WAPI credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if !settings.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for {}", settings.host);
        }

        Ok(Self {
            base_url: format!("https://{}/wapi/v{}/", settings.host, settings.version),
            username: settings.username,
            password: settings.password,
            client,
            dry_run: settings.dry_run,
        })
    }

    /// Base URL all requests are made against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<String, ConnectorError> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(map_request_error)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_status(status.as_u16(), &body))
        }
    }

    fn log_dry_run(&self, method: &str, url: &str, fields: Option<&ContainerFields>) {
        let payload = fields
            .and_then(|f| serde_json::to_string(f).ok())
            .unwrap_or_default();
        tracing::info!("[DRY-RUN] Would send {} request to {} {}", method, url, payload);
    }
}

#[async_trait]
impl Connector for WapiConnector {
    async fn create(
        &self,
        object_type: ObjectType,
        fields: &ContainerFields,
    ) -> std::result::Result<ObjectRef, ConnectorError> {
        let url = self.url(object_type.wapi_name());
        tracing::info!(
            "{} {} {} [mode: {}]",
            if self.dry_run { "Would create" } else { "Creating" },
            object_type.wapi_name(),
            fields.network.as_deref().unwrap_or("<none>"),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            self.log_dry_run("POST", &url, Some(fields));
            return Ok(ObjectRef::new(format!(
                "{}/{}:{}/{}",
                object_type.wapi_name(),
                DRY_RUN_MARKER,
                fields.network.as_deref().unwrap_or_default(),
                fields.network_view.as_deref().unwrap_or("default")
            )));
        }

        let body = self.send(self.client.post(&url).json(fields)).await?;
        parse_reference(&body)
    }

    async fn get(&self, reference: &ObjectRef) -> std::result::Result<ContainerFields, ConnectorError> {
        if is_dry_run_reference(reference) {
            return Err(ConnectorError::NotFound(format!(
                "{} was never created (dry-run)",
                reference
            )));
        }

        let url = self.url(reference.as_str());
        tracing::debug!("Reading {}", reference);

        let body = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("_return_fields", RETURN_FIELDS)]),
            )
            .await?;
        parse_object(&body)
    }

    async fn update(
        &self,
        reference: &ObjectRef,
        fields: &ContainerFields,
    ) -> std::result::Result<ObjectRef, ConnectorError> {
        let url = self.url(reference.as_str());
        tracing::info!(
            "{} {} [mode: {}]",
            if self.dry_run { "Would update" } else { "Updating" },
            reference,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            self.log_dry_run("PUT", &url, Some(fields));
            return Ok(reference.clone());
        }

        let body = self.send(self.client.put(&url).json(fields)).await?;
        parse_reference(&body)
    }

    async fn delete(&self, reference: &ObjectRef) -> std::result::Result<ObjectRef, ConnectorError> {
        let url = self.url(reference.as_str());
        tracing::info!(
            "{} {} [mode: {}]",
            if self.dry_run { "Would delete" } else { "Deleting" },
            reference,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            self.log_dry_run("DELETE", &url, None);
            return Ok(reference.clone());
        }

        let body = self.send(self.client.delete(&url)).await?;
        parse_reference(&body)
    }

    fn connector_name(&self) -> &'static str {
        "wapi"
    }
}

fn is_dry_run_reference(reference: &ObjectRef) -> bool {
    reference
        .as_str()
        .split_once('/')
        .is_some_and(|(_, rest)| rest.starts_with(DRY_RUN_MARKER))
}

fn map_request_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(format!("HTTP request timed out: {}", e))
    } else {
        ConnectorError::Transport(format!("HTTP request failed: {}", e))
    }
}

/// Map a non-success status onto a connector error
fn classify_status(status: u16, body: &str) -> ConnectorError {
    let message = error_text(body);
    match status {
        404 => ConnectorError::NotFound(message),
        400 if message.contains("already exists") => ConnectorError::Conflict(message),
        401 | 403 => ConnectorError::Transport(format!(
            "Authentication failed: invalid credentials or insufficient permissions. Status: {}",
            status
        )),
        500..=599 => ConnectorError::Transport(format!(
            "WAPI server error (transient): {} - {}",
            status, message
        )),
        _ => ConnectorError::Transport(format!("Request failed: {} - {}", status, message)),
    }
}

/// Human-readable part of a WAPI error body
fn error_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("text")
            .or_else(|| map.get("Error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.trim().to_string(),
    }
}

/// Parse the quoted reference returned by create, update and delete
fn parse_reference(body: &str) -> std::result::Result<ObjectRef, ConnectorError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(reference)) if !reference.is_empty() => Ok(ObjectRef::new(reference)),
        Ok(other) => Err(ConnectorError::Malformed(format!(
            "expected an object reference, got {}",
            other
        ))),
        Err(e) => Err(ConnectorError::Malformed(format!(
            "Failed to parse response: {}",
            e
        ))),
    }
}

/// Parse a read response
///
/// A body that carries an error next to object data is rejected rather
/// than trusted either way.
fn parse_object(body: &str) -> std::result::Result<ContainerFields, ConnectorError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ConnectorError::Malformed(format!("Failed to parse response: {}", e)))?;

    let Value::Object(map) = &value else {
        return Err(ConnectorError::Malformed(format!(
            "expected an object, got {}",
            value
        )));
    };
    if map.contains_key("Error") {
        return Err(ConnectorError::Malformed(format!(
            "response carries both an error and object data: {}",
            error_text(body)
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| ConnectorError::Malformed(format!("Invalid object in response: {}", e)))
}

/// Factory for creating WAPI connectors
pub struct WapiFactory;

impl ConnectorFactory for WapiFactory {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        config.validate()?;

        match config {
            ConnectorConfig::Wapi {
                host,
                username,
                password,
                version,
                verify_tls,
                timeout_secs,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("WAPI connector running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(WapiConnector::new(WapiSettings {
                    host: host.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    version: version.clone(),
                    verify_tls: *verify_tls,
                    timeout: Duration::from_secs(*timeout_secs),
                    dry_run: *dry_run,
                })?))
            }
        }
    }
}
