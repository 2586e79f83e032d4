// # etcd Record Store
//
// This crate writes presence records to etcd through the v3 JSON gateway
// (`/v3/...`), which every etcd 3.4+ server serves on its client port.
//
// ## Behaviour
//
// - One HTTP request per put or delete; no retry, no batching
// - Keys and values are base64-encoded as the gateway requires
// - `connect` probes `/v3/maintenance/status` so an unreachable store
//   fails before any write is attempted
// - Dry-run mode probes the store but only logs writes
//
// ## API Reference
//
// - Put: POST `/v3/kv/put` `{"key": b64, "value": b64}`
// - Delete: POST `/v3/kv/deleterange` `{"key": b64}`
// - Status: POST `/v3/maintenance/status` `{}`

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use vmdns_core::config::StoreConfig;
use vmdns_core::traits::{StoreConnector, StoreSession};
use vmdns_core::{Error, Result};

const STATUS_PATH: &str = "v3/maintenance/status";
const PUT_PATH: &str = "v3/kv/put";
const DELETE_RANGE_PATH: &str = "v3/kv/deleterange";

/// etcd store connector
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, sessions:
/// - Perform the status probe on connect
/// - Log each intended put and delete
/// - **NOT** modify any key
#[derive(Debug, Clone)]
pub struct EtcdStore {
    /// Gateway base URL, always ending in `/`
    base_url: Url,

    /// Bound on connection establishment and the status probe
    dial_timeout: Duration,

    dry_run: bool,
}

impl EtcdStore {
    /// Create a connector from the store configuration
    ///
    /// An endpoint without a scheme (`etcd.corp.local:2379`) is taken as
    /// plain `http://`. Anything that is not then a valid http(s) URL is a
    /// configuration error.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = normalize_endpoint(&config.endpoint)?;

        if config.dry_run {
            warn!("etcd store running in DRY-RUN mode - no keys will be written");
        }

        Ok(Self {
            base_url,
            dial_timeout: config.dial_timeout(),
            dry_run: config.dry_run,
        })
    }

    /// Gateway base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether writes are logged instead of sent
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::config(format!("Invalid etcd endpoint path {}: {}", path, e)))
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::config("etcd endpoint is empty"));
    }

    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| Error::config(format!("Invalid etcd endpoint '{}': {}", endpoint, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::config(format!(
            "etcd endpoint must be an http(s) address. Got: {}",
            endpoint
        )));
    }

    // Url::join replaces the last segment unless the path ends in '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

#[async_trait]
impl StoreConnector for EtcdStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.dial_timeout)
            .build()
            .map_err(|e| Error::store_connect(format!("Failed to build HTTP client: {}", e)))?;

        let status_url = self.endpoint(STATUS_PATH)?;
        debug!("Probing etcd at {}", status_url);

        let response = client
            .post(status_url)
            .timeout(self.dial_timeout)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                Error::store_connect(format!(
                    "etcd at {} unreachable within {:?}: {}",
                    self.base_url, self.dial_timeout, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::store_connect(format!(
                "etcd status probe failed: {} - {}",
                status,
                gateway_message(&body)
            )));
        }

        let version = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["version"].as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        info!("Connected to etcd {} at {}", version, self.base_url);

        Ok(Box::new(EtcdSession {
            client,
            put_url: self.endpoint(PUT_PATH)?,
            delete_url: self.endpoint(DELETE_RANGE_PATH)?,
            dry_run: self.dry_run,
        }))
    }

    fn store_name(&self) -> &'static str {
        "etcd"
    }
}

#[derive(Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct DeleteRangeRequest {
    key: String,
}

/// int64 fields are JSON strings on the gateway and omitted when zero
#[derive(Deserialize, Default)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: Option<String>,
}

/// An open etcd session
///
/// # Trust Level: Untrusted
///
/// Each call is exactly one request. Errors are returned to the
/// synchronizer, which owns the failure policy.
struct EtcdSession {
    client: reqwest::Client,
    put_url: Url,
    delete_url: Url,
    dry_run: bool,
}

impl EtcdSession {
    async fn post<T: Serialize>(&self, url: &Url, key: &str, body: &T) -> Result<String> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::write(key, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::write(key, format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            return Ok(text);
        }

        let message = gateway_message(&text);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::write(key, format!("Permission denied: {} - {}", status, message))
            }
            s if s.is_server_error() => {
                Error::write(key, format!("etcd server error: {} - {}", s, message))
            }
            s => Error::write(key, format!("Request rejected: {} - {}", s, message)),
        })
    }
}

#[async_trait]
impl StoreSession for EtcdSession {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if self.dry_run {
            info!("[DRY-RUN] Would put {} = {}", key, value);
            return Ok(());
        }

        let request = PutRequest {
            key: BASE64.encode(key),
            value: BASE64.encode(value),
        };
        self.post(&self.put_url, key, &request).await?;

        debug!("Put {} = {}", key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.dry_run {
            info!("[DRY-RUN] Would delete {}", key);
            return Ok(());
        }

        let request = DeleteRangeRequest {
            key: BASE64.encode(key),
        };
        let body = self.post(&self.delete_url, key, &request).await?;

        let deleted = serde_json::from_str::<DeleteRangeResponse>(&body)
            .unwrap_or_default()
            .deleted
            .unwrap_or_default();

        match deleted.as_str() {
            "" | "0" => debug!("Delete {}: key already absent", key),
            _ => debug!("Deleted {}", key),
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Connections are pooled per client and dropped with the session.
        debug!("Closing etcd session");
        Ok(())
    }
}

/// Best-effort error text from a gateway error body
fn gateway_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
