use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::HarvestError;
use crate::types::{ApiResponse, TaskStatus};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

/// Size of the write buffer used when streaming a model to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// A client for the parts of the Tripo3D API the harvester needs.
///
/// It holds an authenticated `reqwest::Client` for API calls and a second,
/// unauthenticated one for fetching model files from their CDN URLs.
#[derive(Clone)]
pub struct TripoClient {
    client: reqwest::Client,
    download_client: reqwest::Client,
    base_url: Url,
}

impl TripoClient {
    /// Creates a new `TripoClient` from the harvester configuration.
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        Self::build(
            &config.tripo_api_key,
            &config.tripo_api_base,
            config.request_timeout,
        )
    }

    /// Creates a new `TripoClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting to a different API endpoint.
    ///
    /// # Arguments
    ///
    /// * `api_key` - The API key for authentication.
    /// * `base_url` - The base URL for the API (e.g., for a mock server).
    ///
    /// # Errors
    ///
    /// - `HarvestError::InvalidConfig` if the key cannot be sent as a header.
    /// - `HarvestError::RequestFailed` if the internal HTTP client fails to build.
    /// - `HarvestError::UrlParseFailed` if the provided `base_url` is invalid.
    pub fn new_with_url(api_key: String, base_url: &str) -> Result<Self, HarvestError> {
        Self::build(
            &api_key,
            base_url,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    fn build(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, HarvestError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
            HarvestError::InvalidConfig {
                name: "TRIPO_API_KEY",
                message: e.to_string(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let download_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        // `Url::join` drops the last path segment unless the base ends with a slash.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        Ok(Self {
            client,
            download_client,
            base_url,
        })
    }

    /// Retrieves the status of a specific task.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, on a non-2xx response and when the
    /// body does not decode into a [`TaskStatus`].
    pub async fn get_task(&self, task_id: &str) -> Result<TaskStatus, HarvestError> {
        let url = self.base_url.join(&format!("task/{}", task_id))?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            let body = response.bytes().await?;
            let api_response: ApiResponse<TaskStatus> = serde_json::from_slice(&body)?;
            Ok(api_response.data)
        } else {
            let status = response.status();
            let error_response: serde_json::Value = response.json().await.unwrap_or_default();
            Err(HarvestError::ApiError {
                message: format!("status {}: {}", status, error_response),
            })
        }
    }

    /// Downloads a model file to `dest`, overwriting any existing file.
    ///
    /// The body is streamed through a [`DOWNLOAD_CHUNK_SIZE`] buffer and the
    /// parent directory is created if needed.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    pub async fn download_model(&self, url: &str, dest: &Path) -> Result<u64, HarvestError> {
        let url = Url::parse(url)?;
        let response = self.download_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(HarvestError::ApiError {
                message: format!("Failed to download file: status {}", response.status()),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        Ok(written)
    }
}
