//! Backend access: `GET /teachers`, `GET /courses`, `PUT /teachers/{id}`

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::records::{Course, Teacher};
use crate::error::{GridError, GridResult, SyncOperation};

/// Read/write contract the grid needs from the backend
pub trait SyncClient: Send + Sync {
    fn fetch_teachers(&self) -> GridResult<Vec<Teacher>>;

    fn fetch_courses(&self) -> GridResult<Vec<Course>>;

    /// Replace the stored teacher with `teacher`; returns the echoed record
    fn update_teacher(&self, teacher: &Teacher) -> GridResult<Teacher>;
}

#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSyncClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn read_json<T: DeserializeOwned>(
        operation: SyncOperation,
        response: reqwest::Result<reqwest::blocking::Response>,
    ) -> GridResult<T> {
        let response = response.map_err(|e| GridError::network(operation.clone(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GridError::Network {
                operation,
                status: Some(status.as_u16()),
                message: format!("{} {}", status, body.trim()),
            });
        }

        response
            .json::<T>()
            .map_err(|e| GridError::network(operation, format!("invalid response body: {}", e)))
    }

    fn get<T: DeserializeOwned>(&self, path: &str, operation: SyncOperation) -> GridResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(target: "sync", "GET {}", url);
        Self::read_json(operation, self.client.get(&url).send())
    }
}

impl SyncClient for HttpSyncClient {
    fn fetch_teachers(&self) -> GridResult<Vec<Teacher>> {
        self.get("/teachers", SyncOperation::FetchTeachers)
    }

    fn fetch_courses(&self) -> GridResult<Vec<Course>> {
        self.get("/courses", SyncOperation::FetchCourses)
    }

    fn update_teacher(&self, teacher: &Teacher) -> GridResult<Teacher> {
        let url = format!("{}/teachers/{}", self.base_url, teacher.id);
        debug!(target: "sync", "PUT {} ({} courses)", url, teacher.courses.len());
        Self::read_json(
            SyncOperation::UpdateTeacher(teacher.id.clone()),
            self.client.put(&url).json(teacher).send(),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Backend kept in memory. Serves `--data` files offline and backs the tests,
/// which can make individual writes or all reads fail.
#[derive(Debug, Default)]
pub struct InMemorySyncClient {
    teachers: Mutex<Vec<Teacher>>,
    courses: Vec<Course>,
    failing_updates: Mutex<HashSet<String>>,
    failing_reads: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

/// Offline data file: the two collections the backend would serve
#[derive(Debug, Deserialize)]
struct ScheduleFile {
    teachers: Vec<Teacher>,
    courses: Vec<Course>,
}

impl InMemorySyncClient {
    pub fn new(teachers: Vec<Teacher>, courses: Vec<Course>) -> Self {
        Self {
            teachers: Mutex::new(teachers),
            courses,
            ..Self::default()
        }
    }

    /// Serve `{"teachers": [...], "courses": [...]}` from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file: {}", path.display()))?;
        let file: ScheduleFile = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid data file: {}", path.display()))?;
        info!(
            target: "sync",
            "offline backend: {} teachers, {} courses from {}",
            file.teachers.len(),
            file.courses.len(),
            path.display()
        );
        Ok(Self::new(file.teachers, file.courses))
    }

    pub fn fail_updates_for(&self, teacher_id: &str) {
        lock(&self.failing_updates).insert(teacher_id.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        *lock(&self.failing_reads) = fail;
    }

    /// Every call made so far, e.g. `"PUT /teachers/t1"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn teachers(&self) -> Vec<Teacher> {
        lock(&self.teachers).clone()
    }

    fn record(&self, operation: &SyncOperation) {
        lock(&self.calls).push(operation.to_string());
    }

    fn read<T: Clone>(&self, operation: SyncOperation, value: impl FnOnce() -> T) -> GridResult<T> {
        self.record(&operation);
        if *lock(&self.failing_reads) {
            return Err(GridError::network(operation, "backend unavailable"));
        }
        Ok(value())
    }
}

impl SyncClient for InMemorySyncClient {
    fn fetch_teachers(&self) -> GridResult<Vec<Teacher>> {
        self.read(SyncOperation::FetchTeachers, || self.teachers())
    }

    fn fetch_courses(&self) -> GridResult<Vec<Course>> {
        self.read(SyncOperation::FetchCourses, || self.courses.clone())
    }

    fn update_teacher(&self, teacher: &Teacher) -> GridResult<Teacher> {
        let operation = SyncOperation::UpdateTeacher(teacher.id.clone());
        self.record(&operation);

        if lock(&self.failing_updates).contains(&teacher.id) {
            warn!(target: "sync", "simulated failure for {}", operation);
            return Err(GridError::Network {
                operation,
                status: Some(500),
                message: "simulated failure".into(),
            });
        }

        let mut teachers = lock(&self.teachers);
        match teachers.iter_mut().find(|t| t.id == teacher.id) {
            Some(stored) => {
                *stored = teacher.clone();
                Ok(teacher.clone())
            }
            None => Err(GridError::Network {
                operation,
                status: Some(404),
                message: "Not Found".into(),
            }),
        }
    }
}
