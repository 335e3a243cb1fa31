//! In-memory `EntityStore`, used by tests and when no database path is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::entities::{
    Job, JobPatch, Machine, MachinePatch, NewJob, NewMachine, NewWorker, SortKey, Worker,
    WorkerPatch,
};
use crate::error::StorageError;

use super::traits::EntityStore;

/// Volatile store holding each collection in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<Vec<Job>>,
    machines: RwLock<Vec<Machine>>,
    workers: RwLock<Vec<Worker>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<T: Clone>(
    records: &[T],
    created: fn(&T) -> DateTime<Utc>,
    sort: SortKey,
    limit: Option<usize>,
) -> Vec<T> {
    let mut out = records.to_vec();
    // Stable sort keeps insertion order for equal timestamps
    out.sort_by_key(created);
    if sort == SortKey::CreatedDesc {
        out.reverse();
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list_jobs(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Job>, StorageError> {
        Ok(sorted(&self.jobs.read().await, |j| j.created_at, sort, limit))
    }

    async fn create_job(&self, job: NewJob) -> Result<Job, StorageError> {
        let job = job.into_job(Utc::now());
        self.jobs.write().await.push(job.clone());
        debug!(job_id = %job.id, "Job created");
        Ok(job)
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, StorageError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StorageError::not_found("job", id))?;
        patch.apply(job);
        Ok(job.clone())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn list_machines(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Machine>, StorageError> {
        Ok(sorted(&self.machines.read().await, |m| m.created_at, sort, limit))
    }

    async fn create_machine(&self, machine: NewMachine) -> Result<Machine, StorageError> {
        let machine = machine.into_machine(Utc::now());
        self.machines.write().await.push(machine.clone());
        Ok(machine)
    }

    async fn update_machine(
        &self,
        id: &str,
        patch: &MachinePatch,
    ) -> Result<Machine, StorageError> {
        let mut machines = self.machines.write().await;
        let machine = machines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StorageError::not_found("machine", id))?;
        patch.apply(machine);
        Ok(machine.clone())
    }

    async fn list_workers(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Worker>, StorageError> {
        Ok(sorted(&self.workers.read().await, |w| w.created_at, sort, limit))
    }

    async fn create_worker(&self, worker: NewWorker) -> Result<Worker, StorageError> {
        let worker = worker.into_worker(Utc::now());
        self.workers.write().await.push(worker.clone());
        Ok(worker)
    }

    async fn update_worker(
        &self,
        id: &str,
        patch: &WorkerPatch,
    ) -> Result<Worker, StorageError> {
        let mut workers = self.workers.write().await;
        let worker = workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| StorageError::not_found("worker", id))?;
        patch.apply(worker);
        Ok(worker.clone())
    }
}
