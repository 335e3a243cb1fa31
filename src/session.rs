//! Floor session: the single owned container for the in-memory snapshot.
//!
//! Holds the latest jobs/machines/workers read from the store together with
//! the KPIs and alerts derived from them. Every mutation goes to the store
//! first and is followed by a reload; the only local write is the optimistic
//! job update used by reassignment.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, AlertFeed, AlertRules};
use crate::config::FloorConfig;
use crate::entities::lifecycle;
use crate::entities::{Job, JobPatch, JobStatus, Machine, NewJob, SortKey, Worker};
use crate::error::{Result, StorageError};
use crate::metrics::{Analytics, FloorMetrics, Kpi, SnapshotHistory, build_kpis};
use crate::store::EntityStore;

/// Point-in-time view of the floor plus everything derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub machines: Vec<Machine>,
    pub workers: Vec<Worker>,
    pub metrics: FloorMetrics,
    pub kpis: Vec<Kpi>,
    /// `None` until the first reload completes.
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    ticket: u64,
}

impl Snapshot {
    fn empty() -> Self {
        let metrics = FloorMetrics::calculate(&[], &[], &[]);
        Self {
            jobs: Vec::new(),
            machines: Vec::new(),
            workers: Vec::new(),
            kpis: build_kpis(&metrics, None),
            metrics,
            loaded_at: None,
            ticket: 0,
        }
    }
}

pub struct FloorSession {
    store: Arc<dyn EntityStore>,
    config: FloorConfig,
    rules: AlertRules,
    state: RwLock<Snapshot>,
    alerts: Arc<AlertFeed>,
    history: Mutex<SnapshotHistory>,
    next_ticket: AtomicU64,
}

impl FloorSession {
    pub fn new(store: Arc<dyn EntityStore>, config: FloorConfig) -> Arc<Self> {
        let rules = AlertRules {
            idle_machine_threshold: config.idle_machine_threshold,
        };
        Arc::new(Self {
            store,
            rules,
            state: RwLock::new(Snapshot::empty()),
            alerts: AlertFeed::new(config.alert_retention),
            history: Mutex::new(SnapshotHistory::new()),
            next_ticket: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &FloorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn alerts(&self) -> &Arc<AlertFeed> {
        &self.alerts
    }

    /// Re-read all three collections and re-derive KPIs and alerts.
    ///
    /// A reload that finishes after a newer one has already been applied is
    /// dropped, so the snapshot never moves backwards.
    pub async fn reload(&self) -> std::result::Result<(), StorageError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;

        let (jobs, machines, workers) = tokio::try_join!(
            self.store
                .list_jobs(SortKey::CreatedDesc, Some(self.config.job_list_limit)),
            self.store.list_machines(SortKey::CreatedAsc, None),
            self.store.list_workers(SortKey::CreatedAsc, None),
        )?;

        let now = Utc::now();
        let metrics = FloorMetrics::calculate(&jobs, &machines, &workers);
        let derived = self.rules.generate(&jobs, &machines, now);

        let mut state = self.state.write().await;
        if ticket < state.ticket {
            debug!(ticket, applied = state.ticket, "Discarding stale reload");
            return Ok(());
        }

        let kpis = {
            let mut history = self.history.lock().await;
            let window = chrono::Duration::from_std(self.config.trend_window)
                .unwrap_or_else(|_| chrono::Duration::hours(24));
            let kpis = build_kpis(&metrics, history.baseline(now, window));
            history.record(metrics.sample(now));
            kpis
        };

        debug!(
            ticket,
            jobs = jobs.len(),
            machines = machines.len(),
            workers = workers.len(),
            "Snapshot reloaded"
        );

        *state = Snapshot {
            jobs,
            machines,
            workers,
            metrics,
            kpis,
            loaded_at: Some(now),
            ticket,
        };
        // Swap alerts while still holding the snapshot so two racing reloads
        // cannot leave the older alert set in place.
        self.alerts.replace_derived(derived).await;
        Ok(())
    }

    /// Reload after a mutation; a failure here is logged, not returned.
    pub async fn reload_after_mutation(&self, reason: &str) {
        if let Err(e) = self.reload().await {
            warn!(reason = reason, error = %e, "Reload after mutation failed");
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.state.read().await.jobs.clone()
    }

    pub async fn machines(&self) -> Vec<Machine> {
        self.state.read().await.machines.clone()
    }

    pub async fn workers(&self) -> Vec<Worker> {
        self.state.read().await.workers.clone()
    }

    pub async fn kpis(&self) -> Vec<Kpi> {
        self.state.read().await.kpis.clone()
    }

    pub async fn alert_list(&self) -> Vec<Alert> {
        self.alerts.snapshot().await
    }

    /// Current (jobs, machines, workers) counts.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.read().await;
        (state.jobs.len(), state.machines.len(), state.workers.len())
    }

    /// Optimistically mutate a job in the local snapshot.
    ///
    /// Returns `false` if the job is not in the snapshot. The store is not
    /// touched; the next reload overwrites whatever was changed here.
    pub async fn apply_local<F>(&self, job_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.state.write().await;
        match state.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    /// Analytics over a fresh, larger read of the store.
    pub async fn analytics(&self) -> std::result::Result<Analytics, StorageError> {
        let (jobs, machines, workers) = tokio::try_join!(
            self.store
                .list_jobs(SortKey::CreatedDesc, Some(self.config.analytics_job_limit)),
            self.store.list_machines(SortKey::CreatedAsc, None),
            self.store.list_workers(SortKey::CreatedAsc, None),
        )?;
        let history = self.history.lock().await;
        Ok(Analytics::calculate(
            &jobs,
            &machines,
            &workers,
            &history,
            Utc::now(),
            self.config.hourly_target,
        ))
    }

    /// Validate and persist a new job, then reload.
    pub async fn create_job(&self, new_job: NewJob) -> Result<Job> {
        new_job.validate()?;
        let job = self.store.create_job(new_job).await?;
        info!(job_id = %job.id, title = %job.title, "Job created");
        self.reload_after_mutation("create_job").await;
        Ok(job)
    }

    /// Save a partial update, then reload.
    ///
    /// A status in the patch goes through the lifecycle policy, which alone
    /// decides `start_time`/`end_time`.
    pub async fn update_job(&self, id: &str, mut patch: JobPatch) -> Result<Job> {
        patch.validate()?;
        if let Some(target) = patch.status {
            let current = self.fetch_job(id).await?;
            let effects = lifecycle::transition(&current, target, Utc::now())?;
            patch.status = effects.status;
            patch.start_time = effects.start_time;
            patch.end_time = effects.end_time;
        }

        let job = self.store.update_job(id, &patch).await?;
        debug!(job_id = %id, "Job updated");
        self.reload_after_mutation("update_job").await;
        Ok(job)
    }

    /// Move a job to `target` under the lifecycle policy, then reload.
    pub async fn transition_job(&self, id: &str, target: JobStatus) -> Result<Job> {
        let current = self.fetch_job(id).await?;
        let patch = lifecycle::transition(&current, target, Utc::now())?;
        if patch.is_empty() {
            return Ok(current);
        }

        let job = self.store.update_job(id, &patch).await?;
        info!(job_id = %id, from = %current.status, to = %target, "Job status changed");
        self.reload_after_mutation("transition_job").await;
        Ok(job)
    }

    async fn fetch_job(&self, id: &str) -> std::result::Result<Job, StorageError> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| StorageError::not_found("job", id))
    }
}

/// Reload the session on a fixed interval.
pub fn spawn_reconcile_task(
    session: Arc<FloorSession>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = session.reload().await {
                error!(error = %e, "Periodic reconciliation failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertKind, AlertOrigin};
    use crate::entities::{MachineStatus, NewMachine};
    use crate::error::Error;
    use crate::store::MemoryStore;

    async fn seeded() -> (Arc<MemoryStore>, Arc<FloorSession>) {
        let store = Arc::new(MemoryStore::new());
        store
            .create_machine(NewMachine::new("CNC-01", "cnc", MachineStatus::Operational))
            .await
            .unwrap();
        store
            .create_machine(NewMachine::new("CNC-02", "cnc", MachineStatus::Breakdown))
            .await
            .unwrap();
        let session = FloorSession::new(store.clone(), FloorConfig::default());
        (store, session)
    }

    #[tokio::test]
    async fn reload_derives_kpis_and_alerts() {
        let (_store, session) = seeded().await;
        session.reload().await.unwrap();

        let snap = session.snapshot().await;
        assert_eq!(snap.machines.len(), 2);
        assert!(snap.loaded_at.is_some());
        assert_eq!(snap.kpis[0].title, "Machine Utilization");
        assert_eq!(snap.kpis[0].value, "50%");

        let alerts = session.alert_list().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Critical);
        assert!(alerts[0].message.contains("CNC-02"));
    }

    #[tokio::test]
    async fn reload_replaces_derived_alerts_only() {
        let (_store, session) = seeded().await;
        session.reload().await.unwrap();
        session
            .alerts()
            .prepend(
                Alert::new(AlertKind::Critical, "Disruption: x", "y", Utc::now())
                    .with_origin(AlertOrigin::Disruption),
            )
            .await;
        session.reload().await.unwrap();

        let alerts = session.alert_list().await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(
            alerts
                .iter()
                .filter(|a| a.origin == AlertOrigin::Disruption)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn create_job_validates_and_reloads() {
        let (_store, session) = seeded().await;
        let err = session.create_job(NewJob::new("", 1.0)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let job = session.create_job(NewJob::new("Bracket", 2.0)).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        let jobs = session.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job.id);
    }

    #[tokio::test]
    async fn transition_stamps_start_and_rejects_unstarted_completion() {
        let (_store, session) = seeded().await;
        let job = session.create_job(NewJob::new("Shaft", 1.0)).await.unwrap();

        let err = session
            .transition_job(&job.id, JobStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Lifecycle(_)));

        let started = session
            .transition_job(&job.id, JobStatus::InProgress)
            .await
            .unwrap();
        assert!(started.start_time.is_some());
        assert_eq!(session.snapshot().await.metrics.active_jobs, 1);
    }

    #[tokio::test]
    async fn update_job_routes_status_through_lifecycle() {
        let (_store, session) = seeded().await;
        let job = session.create_job(NewJob::new("Flange", 1.0)).await.unwrap();

        let patch = JobPatch {
            status: Some(JobStatus::InProgress),
            title: Some("Flange rev B".into()),
            ..JobPatch::default()
        };
        let updated = session.update_job(&job.id, patch).await.unwrap();
        assert_eq!(updated.title, "Flange rev B");
        assert!(updated.start_time.is_some());
    }

    #[tokio::test]
    async fn update_job_rejects_timestamps_and_bad_fields() {
        let (store, session) = seeded().await;
        let job = session.create_job(NewJob::new("Sleeve", 2.0)).await.unwrap();

        let stamped = JobPatch {
            end_time: Some(Utc::now()),
            ..JobPatch::default()
        };
        let negative = JobPatch {
            duration: Some(-5.0),
            ..JobPatch::default()
        };
        let backdated = JobPatch {
            status: Some(JobStatus::InProgress),
            start_time: Some(Utc::now() - chrono::Duration::days(3)),
            ..JobPatch::default()
        };
        for patch in [stamped, negative, backdated] {
            let err = session.update_job(&job.id, patch).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        let stored = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
        assert_eq!(stored.duration, 2.0);
        assert!(stored.start_time.is_none());
        assert!(stored.end_time.is_none());
    }

    #[tokio::test]
    async fn update_job_keeps_existing_start_time() {
        let (_store, session) = seeded().await;
        let job = session.create_job(NewJob::new("Collar", 1.0)).await.unwrap();
        let started = session
            .transition_job(&job.id, JobStatus::InProgress)
            .await
            .unwrap();
        session
            .transition_job(&job.id, JobStatus::Delayed)
            .await
            .unwrap();

        let resumed = session
            .update_job(
                &job.id,
                JobPatch {
                    status: Some(JobStatus::InProgress),
                    ..JobPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resumed.start_time, started.start_time);

        let done = session
            .update_job(
                &job.id,
                JobPatch {
                    status: Some(JobStatus::Completed),
                    ..JobPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(done.end_time.is_some());
        assert!(done.start_time <= done.end_time);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (_store, session) = seeded().await;
        let err = session
            .transition_job("missing", JobStatus::Delayed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn apply_local_is_overwritten_by_reload() {
        let (_store, session) = seeded().await;
        let job = session.create_job(NewJob::new("Pin", 1.0)).await.unwrap();

        assert!(
            session
                .apply_local(&job.id, |j| j.assigned_machine = Some("ghost".into()))
                .await
        );
        assert_eq!(
            session.jobs().await[0].assigned_machine.as_deref(),
            Some("ghost")
        );
        session.reload().await.unwrap();
        assert_eq!(session.jobs().await[0].assigned_machine, None);
        assert!(!session.apply_local("missing", |_| {}).await);
    }

    #[tokio::test]
    async fn analytics_reads_store() {
        let (_store, session) = seeded().await;
        session.create_job(NewJob::new("A", 1.0)).await.unwrap();
        let analytics = session.analytics().await.unwrap();
        assert_eq!(analytics.job_stats.total, 1);
        assert_eq!(analytics.machine_stats.breakdown, 1);
        assert_eq!(analytics.efficiency_trend.len(), 7);
    }
}
