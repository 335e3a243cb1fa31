//! Reassignment coordinator: moves a job between machines.
//!
//! The move shows up in the session snapshot before the store confirms it.
//! Whatever the store answers, a full reload follows, which either confirms
//! the optimistic value or replaces it with the stored one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entities::{Job, JobPatch};
use crate::error::StorageError;
use crate::session::FloorSession;

/// Result of a reassignment request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReassignOutcome {
    /// Source and destination were the same machine; nothing was sent.
    Unchanged,
    /// The store accepted the new assignment.
    Reassigned { job: Job },
}

pub struct ReassignmentCoordinator {
    session: Arc<FloorSession>,
}

impl ReassignmentCoordinator {
    pub fn new(session: Arc<FloorSession>) -> Self {
        Self { session }
    }

    /// Move `job_id` from `from_machine` to `to_machine`.
    ///
    /// A persistence failure is returned after the reload has run, so the
    /// snapshot is already back in line with the store when the caller sees it.
    pub async fn reassign(
        &self,
        job_id: &str,
        from_machine: &str,
        to_machine: &str,
    ) -> Result<ReassignOutcome, StorageError> {
        if from_machine == to_machine {
            debug!(job_id = job_id, machine = from_machine, "Reassign to same machine ignored");
            return Ok(ReassignOutcome::Unchanged);
        }

        let applied = self
            .session
            .apply_local(job_id, |job| {
                job.assigned_machine = Some(to_machine.to_string());
            })
            .await;
        if !applied {
            warn!(job_id = job_id, "Job not in snapshot, persisting without local update");
        }

        let result = self
            .session
            .store()
            .update_job(job_id, &JobPatch::assign_machine(to_machine))
            .await;
        if let Err(ref e) = result {
            warn!(
                job_id = job_id,
                to = to_machine,
                error = %e,
                "Reassignment not persisted"
            );
        }

        self.session.reload_after_mutation("reassign").await;

        let job = result?;
        info!(
            job_id = job_id,
            from = from_machine,
            to = to_machine,
            "Job reassigned"
        );
        Ok(ReassignOutcome::Reassigned { job })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::config::FloorConfig;
    use crate::entities::{
        Machine, MachinePatch, MachineStatus, NewJob, NewMachine, NewWorker, SortKey, Worker,
        WorkerPatch,
    };
    use crate::store::{EntityStore, MemoryStore};

    /// Wraps `MemoryStore`, counting job updates and optionally failing or
    /// pausing them.
    #[derive(Default)]
    struct ProbeStore {
        inner: MemoryStore,
        job_updates: AtomicUsize,
        fail_updates: AtomicBool,
        hold_updates: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl EntityStore for ProbeStore {
        async fn list_jobs(
            &self,
            sort: SortKey,
            limit: Option<usize>,
        ) -> Result<Vec<Job>, StorageError> {
            self.inner.list_jobs(sort, limit).await
        }

        async fn create_job(&self, job: NewJob) -> Result<Job, StorageError> {
            self.inner.create_job(job).await
        }

        async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, StorageError> {
            self.job_updates.fetch_add(1, Ordering::SeqCst);
            if self.hold_updates.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("store offline".into()));
            }
            self.inner.update_job(id, patch).await
        }

        async fn list_machines(
            &self,
            sort: SortKey,
            limit: Option<usize>,
        ) -> Result<Vec<Machine>, StorageError> {
            self.inner.list_machines(sort, limit).await
        }

        async fn create_machine(&self, machine: NewMachine) -> Result<Machine, StorageError> {
            self.inner.create_machine(machine).await
        }

        async fn update_machine(
            &self,
            id: &str,
            patch: &MachinePatch,
        ) -> Result<Machine, StorageError> {
            self.inner.update_machine(id, patch).await
        }

        async fn list_workers(
            &self,
            sort: SortKey,
            limit: Option<usize>,
        ) -> Result<Vec<Worker>, StorageError> {
            self.inner.list_workers(sort, limit).await
        }

        async fn create_worker(&self, worker: NewWorker) -> Result<Worker, StorageError> {
            self.inner.create_worker(worker).await
        }

        async fn update_worker(
            &self,
            id: &str,
            patch: &WorkerPatch,
        ) -> Result<Worker, StorageError> {
            self.inner.update_worker(id, patch).await
        }
    }

    async fn setup() -> (Arc<ProbeStore>, Arc<FloorSession>, Job) {
        let store = Arc::new(ProbeStore::default());
        store
            .create_machine(NewMachine::new("CNC-01", "cnc", MachineStatus::Operational))
            .await
            .unwrap();
        let job = store.create_job(NewJob::new("Housing", 2.0)).await.unwrap();
        store
            .inner
            .update_job(&job.id, &JobPatch::assign_machine("m-1"))
            .await
            .unwrap();

        let session = FloorSession::new(store.clone(), FloorConfig::default());
        session.reload().await.unwrap();
        (store, session, job)
    }

    #[tokio::test]
    async fn same_machine_is_a_no_op() {
        let (store, session, job) = setup().await;
        let before = session.jobs().await;

        let coordinator = ReassignmentCoordinator::new(session.clone());
        let outcome = coordinator.reassign(&job.id, "m-1", "m-1").await.unwrap();

        assert_eq!(outcome, ReassignOutcome::Unchanged);
        assert_eq!(store.job_updates.load(Ordering::SeqCst), 0);
        assert_eq!(session.jobs().await, before);
    }

    #[tokio::test]
    async fn successful_move_survives_reload() {
        let (store, session, job) = setup().await;
        let coordinator = ReassignmentCoordinator::new(session.clone());

        let outcome = coordinator.reassign(&job.id, "m-1", "m-2").await.unwrap();
        match outcome {
            ReassignOutcome::Reassigned { job } => {
                assert_eq!(job.assigned_machine.as_deref(), Some("m-2"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.job_updates.load(Ordering::SeqCst), 1);

        session.reload().await.unwrap();
        let jobs = session.jobs().await;
        assert_eq!(jobs[0].assigned_machine.as_deref(), Some("m-2"));
    }

    #[tokio::test]
    async fn optimistic_value_visible_before_persistence() {
        let (store, session, job) = setup().await;
        store.hold_updates.store(true, Ordering::SeqCst);

        let coordinator = ReassignmentCoordinator::new(session.clone());
        let job_id = job.id.clone();
        let task = tokio::spawn(async move { coordinator.reassign(&job_id, "m-1", "m-3").await });

        store.entered.notified().await;
        assert_eq!(
            session.jobs().await[0].assigned_machine.as_deref(),
            Some("m-3")
        );

        store.release.notify_one();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_persistence_reloads_true_state() {
        let (store, session, job) = setup().await;
        store.fail_updates.store(true, Ordering::SeqCst);

        let coordinator = ReassignmentCoordinator::new(session.clone());
        let err = coordinator
            .reassign(&job.id, "m-1", "m-4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        let jobs = session.jobs().await;
        assert_eq!(jobs[0].assigned_machine.as_deref(), Some("m-1"));
    }

    #[tokio::test]
    async fn job_outside_snapshot_is_still_persisted() {
        let (store, session, _job) = setup().await;
        let hidden = store.inner.create_job(NewJob::new("Late", 1.0)).await.unwrap();

        let coordinator = ReassignmentCoordinator::new(session.clone());
        coordinator.reassign(&hidden.id, "", "m-5").await.unwrap();

        let stored = store.inner.get_job(&hidden.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_machine.as_deref(), Some("m-5"));
    }
}
