//! `EntityStore` trait: the async interface to the external record store.
//!
//! The core keeps no storage of its own; every persisted change goes through
//! one of these calls and every snapshot comes from the `list_*` methods.

use async_trait::async_trait;

use crate::entities::{
    Job, JobPatch, Machine, MachinePatch, NewJob, NewMachine, NewWorker, SortKey, Worker,
    WorkerPatch,
};
use crate::error::StorageError;

/// Backend-agnostic store for jobs, machines, and workers.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ── Jobs ────────────────────────────────────────────────────────

    /// List jobs in `sort` order, up to `limit` (None = all).
    async fn list_jobs(&self, sort: SortKey, limit: Option<usize>)
    -> Result<Vec<Job>, StorageError>;

    /// Persist a new job and return the stored record.
    async fn create_job(&self, job: NewJob) -> Result<Job, StorageError>;

    /// Apply a partial update and return the stored record.
    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, StorageError>;

    /// Get a job by id.
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        let jobs = self.list_jobs(SortKey::CreatedAsc, None).await?;
        Ok(jobs.into_iter().find(|j| j.id == id))
    }

    // ── Machines ────────────────────────────────────────────────────

    async fn list_machines(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Machine>, StorageError>;

    async fn create_machine(&self, machine: NewMachine) -> Result<Machine, StorageError>;

    async fn update_machine(
        &self,
        id: &str,
        patch: &MachinePatch,
    ) -> Result<Machine, StorageError>;

    // ── Workers ─────────────────────────────────────────────────────

    async fn list_workers(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Worker>, StorageError>;

    async fn create_worker(&self, worker: NewWorker) -> Result<Worker, StorageError>;

    async fn update_worker(&self, id: &str, patch: &WorkerPatch)
    -> Result<Worker, StorageError>;
}
