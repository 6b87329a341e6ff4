#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tripo_harvester::{
    Harvester, HarvestError, ObjectStore, PendingRow, RecordStore, TripoClient,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test_api_key";

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn pending(date: &str, task_id: &str) -> PendingRow {
    PendingRow {
        date: date.to_string(),
        tripo_task_id: Some(task_id.to_string()),
    }
}

/// Mounts `GET /task/{task_id}` answering with `data` inside the API envelope.
pub async fn mount_task(server: &MockServer, task_id: &str, data: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/task/{}", task_id)))
        .and(header("authorization", format!("Bearer {}", TEST_API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": data
        })))
        .mount(server)
        .await;
}

/// Mounts a model file at `/{name}` and returns its URL.
pub async fn mount_model(server: &MockServer, name: &str, body: &'static str) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
    format!("{}/{}", server.uri(), name)
}

/// An in-memory `daily_models` table.
#[derive(Default)]
pub struct FakeRecords {
    pub rows: Vec<PendingRow>,
    pub fail_listing: bool,
    pub fail_updates: bool,
    pub completed: Mutex<Vec<(NaiveDate, String)>>,
}

impl FakeRecords {
    pub fn with_rows(rows: Vec<PendingRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn completed(&self) -> Vec<(NaiveDate, String)> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeRecords {
    async fn pending_rows(&self) -> Result<Vec<PendingRow>, HarvestError> {
        if self.fail_listing {
            return Err(HarvestError::Database {
                message: "listing unavailable".into(),
            });
        }
        Ok(self.rows.clone())
    }

    async fn mark_completed(&self, date: NaiveDate, model_key: &str) -> Result<(), HarvestError> {
        if self.fail_updates {
            return Err(HarvestError::Database {
                message: "update rejected".into(),
            });
        }
        self.completed
            .lock()
            .unwrap()
            .push((date, model_key.to_string()));
        Ok(())
    }
}

/// One upload seen by [`FakeStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub path: PathBuf,
    pub key: String,
    pub contents: String,
}

/// A bucket that remembers what was put into it.
#[derive(Default)]
pub struct FakeStorage {
    pub fail: bool,
    pub uploads: Mutex<Vec<Upload>>,
}

impl FakeStorage {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStorage {
    fn name(&self) -> &str {
        "fake"
    }

    async fn put_model(&self, path: &Path, key: &str) -> Result<(), HarvestError> {
        let contents = std::fs::read_to_string(path)?;
        self.uploads.lock().unwrap().push(Upload {
            path: path.to_path_buf(),
            key: key.to_string(),
            contents,
        });
        if self.fail {
            return Err(HarvestError::Storage {
                message: "bucket unavailable".into(),
            });
        }
        Ok(())
    }
}

pub fn harvester(
    server: &MockServer,
    records: Arc<FakeRecords>,
    storage: Arc<FakeStorage>,
    staging_dir: &Path,
) -> Harvester {
    let client = TripoClient::new_with_url(TEST_API_KEY.to_string(), &server.uri()).unwrap();
    Harvester::new(client, records, storage, staging_dir)
}
