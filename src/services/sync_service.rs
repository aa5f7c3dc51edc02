use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use crate::api_client::SyncClient;
use crate::data::records::{Course, Teacher};
use crate::dragdrop::{PersistJob, PersistOutcome};
use crate::error::GridResult;

/// Completed background work, delivered to the UI thread
#[derive(Debug)]
pub enum SyncEvent {
    TeachersLoaded(GridResult<Vec<Teacher>>),
    CoursesLoaded(GridResult<Vec<Course>>),
    Persisted(PersistOutcome),
}

/// Issue the writes of `job` in order. A failed write does not stop the next one.
pub fn run_persist_job(client: &dyn SyncClient, job: &PersistJob) -> PersistOutcome {
    let mut failures = Vec::new();
    let mut applied = 0;
    for record in &job.writes {
        match client.update_teacher(record) {
            Ok(_) => applied += 1,
            Err(e) => {
                error!(target: "sync", "change #{}: {}", job.change_id, e);
                failures.push(e);
            }
        }
    }
    if failures.is_empty() {
        info!(
            target: "sync",
            "change #{} saved ({} writes)", job.change_id, job.writes.len()
        );
    }
    PersistOutcome {
        change_id: job.change_id,
        applied,
        failures,
    }
}

/// Runs backend calls off the UI thread.
///
/// Every call goes through `spawn_blocking` on a private runtime and reports
/// back as a [`SyncEvent`]; the UI drains them with [`SyncService::poll`]
/// between frames.
pub struct SyncService {
    runtime: Runtime,
    client: Arc<dyn SyncClient>,
    tx: UnboundedSender<SyncEvent>,
    rx: UnboundedReceiver<SyncEvent>,
    in_flight: usize,
}

impl SyncService {
    pub fn new(client: Arc<dyn SyncClient>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sync")
            .enable_all()
            .build()
            .context("Failed to start sync runtime")?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            client,
            tx,
            rx,
            in_flight: 0,
        })
    }

    /// Requests issued but not yet drained
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: FnOnce(&dyn SyncClient) -> SyncEvent + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let event = work(client.as_ref());
            // receiver only goes away on shutdown
            let _ = tx.send(event);
        });
    }

    pub fn fetch_teachers(&mut self) {
        debug!(target: "sync", "fetching teachers");
        self.spawn(|client| SyncEvent::TeachersLoaded(client.fetch_teachers()));
    }

    pub fn fetch_courses(&mut self) {
        debug!(target: "sync", "fetching courses");
        self.spawn(|client| SyncEvent::CoursesLoaded(client.fetch_courses()));
    }

    /// Courses first so columns exist by the time teachers arrive
    pub fn refresh_all(&mut self) {
        self.fetch_courses();
        self.fetch_teachers();
    }

    pub fn persist(&mut self, job: PersistJob) {
        debug!(
            target: "sync",
            "persisting change #{} ({} writes)", job.change_id, job.writes.len()
        );
        self.spawn(move |client| SyncEvent::Persisted(run_persist_job(client, &job)));
    }

    /// Drain everything that completed since the last call, without blocking
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    events.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Block until the next event arrives or `timeout` elapses
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<SyncEvent> {
        let rx = &mut self.rx;
        let event = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, rx.recv()).await.ok().flatten() });
        if event.is_some() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        event
    }
}
