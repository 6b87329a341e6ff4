//! Object storage backends for harvested models.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Region, SharedCredentialsProvider};
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::{S3Config, StorageConfig, WranglerConfig};
use crate::error::HarvestError;

/// Content type every model is stored with.
pub const MODEL_CONTENT_TYPE: &str = "model/gltf-binary";

/// A bucket that models can be uploaded into.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this backend, for log lines.
    fn name(&self) -> &str;

    /// Uploads the file at `path` under `key` with [`MODEL_CONTENT_TYPE`].
    async fn put_model(&self, path: &Path, key: &str) -> Result<(), HarvestError>;
}

/// Builds the backend selected by `config`.
pub async fn connect(config: &StorageConfig) -> Box<dyn ObjectStore> {
    match config {
        StorageConfig::S3(s3) => Box::new(S3Store::new(s3).await),
        StorageConfig::Wrangler(wrangler) => Box::new(WranglerStore::new(wrangler)),
    }
}

/// Uploads through the S3 API, which Cloudflare R2 also speaks.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Creates a store with static credentials.
    ///
    /// When an endpoint is configured, requests use path-style addressing so
    /// that R2 and other S3-compatible services resolve the bucket.
    pub async fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "HarvesterStaticProvider",
        );

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config)
            .credentials_provider(SharedCredentialsProvider::new(credentials));

        if let Some(endpoint_url) = &config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_model(&self, path: &Path, key: &str) -> Result<(), HarvestError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| HarvestError::Storage {
                message: format!("cannot read {}: {}", path.display(), e),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(MODEL_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| HarvestError::Storage {
                message: format!("S3 upload failed: {}", e),
            })?;

        Ok(())
    }
}

/// Uploads by running `wrangler r2 object put` as a subprocess.
pub struct WranglerStore {
    program: String,
    bucket: String,
    workdir: Option<PathBuf>,
}

impl WranglerStore {
    pub fn new(config: &WranglerConfig) -> Self {
        Self {
            program: config.program.clone(),
            bucket: config.bucket.clone(),
            workdir: config.workdir.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for WranglerStore {
    fn name(&self) -> &str {
        "wrangler"
    }

    async fn put_model(&self, path: &Path, key: &str) -> Result<(), HarvestError> {
        let mut command = Command::new(&self.program);
        command
            .args(["wrangler", "r2", "object", "put"])
            .arg(format!("{}/{}", self.bucket, key))
            .arg("--file")
            .arg(path)
            .args(["--content-type", MODEL_CONTENT_TYPE, "--remote"]);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarvestError::Storage {
                    message: format!("{} not found", self.program),
                }
            } else {
                HarvestError::IoError(e)
            }
        })?;

        if !output.status.success() {
            return Err(HarvestError::Storage {
                message: format!(
                    "wrangler exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }
}
