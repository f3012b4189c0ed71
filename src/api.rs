// API client module: a small blocking HTTP client that talks to the images
// API. The handler only sees the `Operations` trait, so tests can swap in a
// scripted implementation without any network.

use anyhow::{Context, Result};
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::config::CliConfig;

/// Status code plus the decoded response body, if there was one.
pub type OperationResult = (u16, Option<Value>);

/// The capability the upload handler needs from its host: issue one API
/// operation, and push raw image bytes to a pre-signed URL.
///
/// Non-2xx statuses are data, not errors. `Err` is reserved for transport
/// failures (DNS, connect, timeout, local I/O).
pub trait Operations {
    fn call_operation(
        &self,
        token: &str,
        method: Method,
        operation: &str,
        body: &Value,
    ) -> Result<OperationResult>;

    fn upload_image_data(&self, url: &str, path: &Path, size: u64) -> Result<OperationResult>;
}

/// Normalize a base URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Blocking implementation of [`Operations`] on top of reqwest.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    // Uploads can be gigabytes, so the data client has no overall timeout.
    upload_client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from the resolved CLI configuration.
    pub fn from_config(config: &CliConfig) -> Result<Self> {
        let user_agent = concat!("image-upload/", env!("CARGO_PKG_VERSION"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        let upload_client = Client::builder()
            .timeout(None)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP upload client")?;

        Ok(ApiClient {
            client,
            upload_client,
            base_url: normalize_url(&config.api_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url, operation.trim_start_matches('/'))
    }

    /// Build the Authorization header map. An empty token sends no header,
    /// which lets the API answer 401 on its own terms.
    fn auth_headers(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !token.is_empty() {
            let val = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("API token contains characters not allowed in a header")?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }
}

impl Operations for ApiClient {
    fn call_operation(
        &self,
        token: &str,
        method: Method,
        operation: &str,
        body: &Value,
    ) -> Result<OperationResult> {
        let url = self.operation_url(operation);
        tracing::debug!(%method, %url, "calling API operation");

        let res = self
            .client
            .request(method, &url)
            .headers(Self::auth_headers(token)?)
            .json(body)
            .send()
            .with_context(|| format!("Failed to send request to {}", url))?;

        read_response(res, operation)
    }

    fn upload_image_data(&self, url: &str, path: &Path, size: u64) -> Result<OperationResult> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image file {}", path.display()))?;
        tracing::debug!(path = %path.display(), size, "uploading image data");

        let res = self
            .upload_client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::sized(file, size))
            .send()
            .context("Failed to send image data")?;

        read_response(res, "image data upload")
    }
}

fn read_response(res: Response, what: &str) -> Result<OperationResult> {
    let status = res.status().as_u16();
    let text = res
        .text()
        .with_context(|| format!("Failed to read response body from {}", what))?;
    tracing::debug!(status, what, "received response");
    Ok((status, parse_body(&text)))
}

/// Decode a response body: JSON when it parses, the raw text otherwise,
/// and `None` when there is nothing at all.
pub fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}
