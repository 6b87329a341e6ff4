//! Access to the `daily_models` table.
//!
//! The table lives in a Cloudflare D1 database, reached through its HTTP
//! query endpoint. Every statement is sent with bound parameters.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::{Config, D1Config};
use crate::error::HarvestError;
use crate::types::PendingRow;

const SELECT_PENDING_SQL: &str =
    "SELECT date, tripo_task_id FROM daily_models WHERE status IN (?, ?) ORDER BY date";
const MARK_COMPLETED_SQL: &str =
    "UPDATE daily_models SET model_url = ?, status = 'completed' WHERE date = ?";

/// Row statuses that still need a model.
pub const PENDING_STATUSES: [&str; 2] = ["generating", "failed"];

/// The persistence operations the harvester performs on daily model rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the rows whose status is one of [`PENDING_STATUSES`], ordered by date.
    async fn pending_rows(&self) -> Result<Vec<PendingRow>, HarvestError>;

    /// Points the row for `date` at `model_key` and marks it completed.
    async fn mark_completed(&self, date: NaiveDate, model_key: &str) -> Result<(), HarvestError>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    sql: &'a str,
    params: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct QueryEnvelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<Vec<QueryResult<T>>>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct QueryResult<T> {
    #[serde(default)]
    results: Vec<T>,
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    meta: QueryMeta,
}

#[derive(Debug, Deserialize, Default)]
struct QueryMeta {
    #[serde(default)]
    changes: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// A [`RecordStore`] backed by the D1 HTTP API.
#[derive(Clone)]
pub struct D1Client {
    client: reqwest::Client,
    query_url: Url,
}

impl D1Client {
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        Self::new(&config.d1, config.request_timeout)
    }

    pub fn new(d1: &D1Config, timeout: Duration) -> Result<Self, HarvestError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", d1.api_token)).map_err(|e| {
            HarvestError::InvalidConfig {
                name: "D1_API_TOKEN",
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

        let base = if d1.api_base.ends_with('/') {
            Url::parse(&d1.api_base)?
        } else {
            Url::parse(&format!("{}/", d1.api_base))?
        };
        let query_url = base.join(&format!(
            "accounts/{}/d1/database/{}/query",
            d1.account_id, d1.database_id
        ))?;

        Ok(Self { client, query_url })
    }

    /// Runs one statement and returns its first result set.
    async fn query<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[&str],
    ) -> Result<QueryResult<T>, HarvestError> {
        let response = self
            .client
            .post(self.query_url.clone())
            .json(&QueryRequest { sql, params })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(HarvestError::Database {
                message: format!("status {}: {}", status, String::from_utf8_lossy(&body)),
            });
        }

        let envelope: QueryEnvelope<T> = serde_json::from_slice(&body)?;
        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| format!("[{}] {}", e.code, e.message))
                .collect();
            return Err(HarvestError::Database {
                message: messages.join("; "),
            });
        }

        let result = envelope
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| HarvestError::Database {
                message: "response carried no result set".into(),
            })?;

        if !result.success {
            return Err(HarvestError::Database {
                message: "statement reported failure".into(),
            });
        }

        Ok(result)
    }
}

#[async_trait]
impl RecordStore for D1Client {
    async fn pending_rows(&self) -> Result<Vec<PendingRow>, HarvestError> {
        let result = self
            .query::<PendingRow>(SELECT_PENDING_SQL, &PENDING_STATUSES)
            .await?;
        Ok(result.results)
    }

    async fn mark_completed(&self, date: NaiveDate, model_key: &str) -> Result<(), HarvestError> {
        let date = date.to_string();
        let result = self
            .query::<serde_json::Value>(MARK_COMPLETED_SQL, &[model_key, date.as_str()])
            .await?;

        if result.meta.changes == Some(0) {
            return Err(HarvestError::Database {
                message: format!("no row exists for {}", date),
            });
        }

        Ok(())
    }
}
