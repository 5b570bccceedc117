// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Proxy to master transport.
//!
//! The master serves `POST /rpc/put` and `POST /rpc/get` with JSON bodies.
//! [`HttpRemote`] is the client side, plugged into a `CacheProxy` as its
//! remote store. Failed calls carry an [`RpcFault`] body. Only a fault with
//! [`FAULT_KEY_NOT_FOUND`] means the key is unknown; every other failure,
//! including a bare 404 from a master without RPC routes, is
//! `RemoteUnavailable`.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use shorturl_core::{StoreError, StoreResult, UrlStore};

use crate::metrics;

/// How long to wait for a TCP connection to the master.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutReply {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetReply {
    pub url: String,
}

pub const FAULT_KEY_NOT_FOUND: &str = "key_not_found";
pub const FAULT_REMOTE_UNAVAILABLE: &str = "remote_unavailable";
pub const FAULT_INTERNAL: &str = "internal";

/// Error body of a failed RPC call.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcFault {
    pub code: String,
    pub message: String,
}

impl From<&StoreError> for RpcFault {
    fn from(err: &StoreError) -> Self {
        let code = match err {
            StoreError::KeyNotFound { .. } => FAULT_KEY_NOT_FOUND,
            StoreError::RemoteUnavailable { .. } => FAULT_REMOTE_UNAVAILABLE,
            _ => FAULT_INTERNAL,
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

/// HTTP client for a master's RPC endpoints.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: String,
}

impl HttpRemote {
    /// Build a client for `addr` (`host:port` or a full `http(s)://` URL).
    ///
    /// No connection is made until the first call.
    pub fn connect(addr: &str) -> StoreResult<Self> {
        let addr = addr.trim_end_matches('/');
        let base = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::remote(format!("failed to build client: {}", e)))?;

        tracing::info!(master = %base, "Remote store client ready");
        Ok(Self { client, base })
    }

    /// Base URL of the master.
    pub fn base(&self) -> &str {
        &self.base
    }

    async fn call<Req, Resp>(&self, path: &str, body: &Req, key: Option<&str>) -> StoreResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await;
        metrics::REMOTE_CALL_DURATION
            .with_label_values(&[path])
            .observe(started.elapsed().as_secs_f64());

        let response = response.map_err(|e| StoreError::remote(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Resp>()
                .await
                .map_err(|e| StoreError::remote(format!("malformed reply from master: {}", e)));
        }

        match (status, key, response.json::<RpcFault>().await) {
            (StatusCode::NOT_FOUND, Some(key), Ok(fault)) if fault.code == FAULT_KEY_NOT_FOUND => {
                Err(StoreError::not_found(key))
            }
            (_, _, Ok(fault)) => Err(StoreError::remote(format!(
                "master answered {}: {}",
                status, fault.message
            ))),
            (_, _, Err(_)) => Err(StoreError::remote(format!(
                "master answered {} on {}, is rpc enabled?",
                status, path
            ))),
        }
    }
}

impl UrlStore for HttpRemote {
    async fn put(&self, url: &str) -> StoreResult<String> {
        let request = PutRequest {
            url: url.to_string(),
        };
        let reply: PutReply = self.call("/rpc/put", &request, None).await?;
        Ok(reply.key)
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let request = GetRequest {
            key: key.to_string(),
        };
        let reply: GetReply = self.call("/rpc/get", &request, Some(key)).await?;
        Ok(reply.url)
    }
}
