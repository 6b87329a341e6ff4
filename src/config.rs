use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::HarvestError;

const DEFAULT_TRIPO_API_BASE: &str = "https://api.tripo3d.ai/v2/openapi/";
const DEFAULT_D1_API_BASE: &str = "https://api.cloudflare.com/client/v4/";
const DEFAULT_STAGING_DIR: &str = "/tmp/tripo_models";
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_S3_REGION: &str = "auto";
const DEFAULT_WRANGLER_PROGRAM: &str = "npx";

/// Harvester configuration loaded from environment variables.
///
/// | Env Var                 | Default                                  |
/// |-------------------------|------------------------------------------|
/// | `TRIPO_API_KEY`         | required                                 |
/// | `TRIPO_API_BASE`        | `https://api.tripo3d.ai/v2/openapi/`     |
/// | `D1_ACCOUNT_ID`         | required                                 |
/// | `D1_DATABASE_ID`        | required                                 |
/// | `D1_API_TOKEN`          | required                                 |
/// | `D1_API_BASE`           | `https://api.cloudflare.com/client/v4/`  |
/// | `STAGING_DIR`           | `/tmp/tripo_models`                      |
/// | `REQUEST_TIMEOUT_SECS`  | `300`                                    |
/// | `STORAGE_BACKEND`       | `s3` (`s3` or `wrangler`)                |
/// | `R2_BUCKET`             | required                                 |
/// | `S3_ENDPOINT`           | unset                                    |
/// | `S3_REGION`             | `auto`                                   |
/// | `S3_ACCESS_KEY_ID`      | required for `s3`                        |
/// | `S3_SECRET_ACCESS_KEY`  | required for `s3`                        |
/// | `WRANGLER_PROGRAM`      | `npx`                                    |
/// | `WRANGLER_WORKDIR`      | current directory                        |
#[derive(Clone)]
pub struct Config {
    pub tripo_api_key: String,
    pub tripo_api_base: String,
    pub d1: D1Config,
    /// Directory that holds downloaded models until they are uploaded.
    pub staging_dir: PathBuf,
    /// Timeout applied to API and database requests.
    pub request_timeout: Duration,
    pub storage: StorageConfig,
}

/// Location and credentials of the D1 database holding `daily_models`.
#[derive(Clone)]
pub struct D1Config {
    pub account_id: String,
    pub database_id: String,
    pub api_token: String,
    pub api_base: String,
}

/// Which object store receives the harvested models.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    Wrangler(WranglerConfig),
}

#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Custom endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct WranglerConfig {
    pub bucket: String,
    /// The launcher for wrangler, usually `npx`.
    pub program: String,
    pub workdir: Option<PathBuf>,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tripo_api_key", &REDACTED)
            .field("tripo_api_base", &self.tripo_api_base)
            .field("d1", &self.d1)
            .field("staging_dir", &self.staging_dir)
            .field("request_timeout", &self.request_timeout)
            .field("storage", &self.storage)
            .finish()
    }
}

impl fmt::Debug for D1Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("D1Config")
            .field("account_id", &self.account_id)
            .field("database_id", &self.database_id)
            .field("api_token", &REDACTED)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .finish()
    }
}

impl Config {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// - `HarvestError::MissingConfig` if a required variable is unset or empty.
    /// - `HarvestError::InvalidConfig` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarvestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(HarvestError::MissingConfig { name });

        let request_timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| HarvestError::InvalidConfig {
                    name: "REQUEST_TIMEOUT_SECS",
                    message: e.to_string(),
                })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let bucket = require("R2_BUCKET")?;
        let backend = get("STORAGE_BACKEND").unwrap_or_else(|| "s3".into());
        let storage = match backend.trim().to_ascii_lowercase().as_str() {
            "s3" => StorageConfig::S3(S3Config {
                bucket,
                endpoint: get("S3_ENDPOINT"),
                region: get("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.into()),
                access_key_id: require("S3_ACCESS_KEY_ID")?,
                secret_access_key: require("S3_SECRET_ACCESS_KEY")?,
            }),
            "wrangler" => StorageConfig::Wrangler(WranglerConfig {
                bucket,
                program: get("WRANGLER_PROGRAM").unwrap_or_else(|| DEFAULT_WRANGLER_PROGRAM.into()),
                workdir: get("WRANGLER_WORKDIR").map(PathBuf::from),
            }),
            other => {
                return Err(HarvestError::InvalidConfig {
                    name: "STORAGE_BACKEND",
                    message: format!("expected `s3` or `wrangler`, got `{}`", other),
                })
            }
        };

        Ok(Self {
            tripo_api_key: require("TRIPO_API_KEY")?,
            tripo_api_base: get("TRIPO_API_BASE").unwrap_or_else(|| DEFAULT_TRIPO_API_BASE.into()),
            d1: D1Config {
                account_id: require("D1_ACCOUNT_ID")?,
                database_id: require("D1_DATABASE_ID")?,
                api_token: require("D1_API_TOKEN")?,
                api_base: get("D1_API_BASE").unwrap_or_else(|| DEFAULT_D1_API_BASE.into()),
            },
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            request_timeout: Duration::from_secs(request_timeout_secs),
            storage,
        })
    }
}
