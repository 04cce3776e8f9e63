//! Minimal pRPC client.
//!
//! pRPC is gRPC-over-HTTP/1.1: every call is a `POST` to
//! `/prpc/<service>/<method>` with a JSON body, and the gRPC status code of a
//! failed call comes back in the `X-Prpc-Grpc-Code` header.

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{event, instrument, Level};

/// Prefix the server puts in front of JSON responses to defeat XSSI.
const XSSI_PREFIX: &[u8] = b")]}'";

const GRPC_CODE_HEADER: &str = "x-prpc-grpc-code";

/// Metadata key the inventory service reads the namespace from.
const NAMESPACE_HEADER: &str = "namespace";

pub const GRPC_NOT_FOUND: i32 = 5;

#[derive(Debug, Error)]
pub enum PrpcError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} failed with code {code}: {message}")]
    Status {
        method: String,
        code: i32,
        message: String,
    },
    #[error("malformed response from {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PrpcError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PrpcError::Status { code, .. } if *code == GRPC_NOT_FOUND)
    }
}

#[derive(Debug, Clone)]
pub struct PrpcClient {
    http: Client,
    host: String,
    token: Option<String>,
    namespace: Option<String>,
}

impl PrpcClient {
    /// Client for `host`. A bare host name implies HTTPS; an explicit
    /// `http://` or `https://` scheme is kept as is.
    pub fn new(host: &str, token: Option<String>, timeout: Duration) -> Result<Self, PrpcError> {
        if host.is_empty() {
            return Err(PrpcError::Config("empty service host".to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrpcError::Config(e.to_string()))?;
        Ok(PrpcClient {
            http,
            host: host.trim_end_matches('/').to_string(),
            token,
            namespace: None,
        })
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string()).filter(|ns| !ns.is_empty());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, service: &str, method: &str) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}/prpc/{service}/{method}", self.host)
        } else {
            format!("https://{}/prpc/{service}/{method}", self.host)
        }
    }

    #[instrument(skip(self, request), fields(host = %self.host))]
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Resp, PrpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.url(service, method);
        let full_method = format!("{service}.{method}");

        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(request);
        if let Some(ref namespace) = self.namespace {
            req = req.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        event!(Level::DEBUG, %url, "Sending pRPC request");
        let response = req.send().await.map_err(|source| PrpcError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        let grpc_code = response
            .headers()
            .get(GRPC_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i32>().ok());
        let body = response
            .bytes()
            .await
            .map_err(|source| PrpcError::Transport { url, source })?;

        if !status.is_success() || grpc_code.is_some_and(|c| c != 0) {
            // The 2 is gRPC's UNKNOWN, used when the server omits the header.
            let code = grpc_code.unwrap_or(2);
            let message = String::from_utf8_lossy(&body).trim().to_string();
            event!(Level::DEBUG, code, %message, "pRPC call returned an error status");
            return Err(PrpcError::Status {
                method: full_method,
                code,
                message,
            });
        }

        serde_json::from_slice(strip_xssi_prefix(&body)).map_err(|source| PrpcError::Decode {
            method: full_method,
            source,
        })
    }
}

fn strip_xssi_prefix(body: &[u8]) -> &[u8] {
    match body.strip_prefix(XSSI_PREFIX) {
        Some(rest) => rest.trim_ascii_start(),
        None => body,
    }
}
