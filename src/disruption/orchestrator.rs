//! Disruption response orchestrator.
//!
//! For each disruption: raise a critical alert and hold the optimizing flag,
//! ask the recommendation engine for a plan, release the flag as soon as the
//! engine answers, then after the settling delay raise the resolution alert
//! and reload the session. Instances run independently of each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::alerts::{Alert, AlertKind, AlertOrigin};
use crate::config::FloorConfig;
use crate::recommend::{RecommendationEngine, RecommendationRequest, RescheduleRecommendation};
use crate::session::FloorSession;

use super::flag::OptimizingFlag;
use super::model::{DisruptionEvent, DisruptionPhase, DisruptionRecord};

/// Handle for one running disruption instance.
pub struct DisruptionTicket {
    pub id: Uuid,
    /// Completes once the instance is resolved and the session reloaded.
    pub handle: JoinHandle<()>,
}

/// Timing knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between the engine answering and the resolution alert.
    pub settling_delay: Duration,
    /// Delay reported when the engine omits `estimated_delay`.
    pub default_estimated_delay: f64,
    /// Records kept for lookup. Only resolved records are pruned.
    pub record_retention: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settling_delay: Duration::from_secs(3),
            default_estimated_delay: 15.0,
            record_retention: 100,
        }
    }
}

impl From<&FloorConfig> for OrchestratorConfig {
    fn from(config: &FloorConfig) -> Self {
        Self {
            settling_delay: config.settling_delay,
            default_estimated_delay: config.default_estimated_delay,
            record_retention: config.disruption_retention,
        }
    }
}

pub struct DisruptionOrchestrator {
    engine: Arc<dyn RecommendationEngine>,
    session: Arc<FloorSession>,
    config: OrchestratorConfig,
    flag: Arc<OptimizingFlag>,
    records: Arc<RwLock<HashMap<Uuid, DisruptionRecord>>>,
}

impl DisruptionOrchestrator {
    pub fn new(
        engine: Arc<dyn RecommendationEngine>,
        session: Arc<FloorSession>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            session,
            config,
            flag: Arc::new(OptimizingFlag::new()),
            records: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn flag(&self) -> &Arc<OptimizingFlag> {
        &self.flag
    }

    pub fn is_optimizing(&self) -> bool {
        self.flag.is_optimizing()
    }

    pub async fn get(&self, id: Uuid) -> Option<DisruptionRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// All tracked disruptions, newest event first.
    pub async fn list(&self) -> Vec<DisruptionRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
        records
    }

    /// Start handling a disruption.
    ///
    /// When this returns the critical alert is in the feed and the optimizing
    /// flag is set. The instance runs on its own task from the start, so
    /// dropping this future early does not leave it half-done.
    pub async fn handle(self: &Arc<Self>, event: DisruptionEvent) -> DisruptionTicket {
        let mut record = DisruptionRecord::new(event);
        let id = record.id;

        // Triaging
        record.advance(DisruptionPhase::Triaging);
        let guard = InFlight::acquire(self.flag.clone());

        let (raised_tx, raised_rx) = oneshot::channel();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let request = this.raise(record).await;
            let _ = raised_tx.send(());
            this.optimize(id, request, guard).await;
        });

        // Err means the task panicked before raising.
        let _ = raised_rx.await;
        DisruptionTicket { id, handle }
    }

    /// Track the record, raise the critical alert and build the engine request.
    async fn raise(&self, record: DisruptionRecord) -> RecommendationRequest {
        let id = record.id;
        let event = record.event.clone();
        self.track(record).await;

        info!(
            disruption_id = %id,
            kind = %event.kind,
            resource = %event.resource,
            "Disruption detected"
        );
        self.session
            .alerts()
            .prepend(
                Alert::new(
                    AlertKind::Critical,
                    format!("Disruption: {}", event.kind),
                    format!("{} affected - rescheduling jobs...", event.resource),
                    event.timestamp,
                )
                .with_origin(AlertOrigin::Disruption),
            )
            .await;

        // Optimizing
        let (jobs, machines, workers) = self.session.counts().await;
        let request = RecommendationRequest::new(build_prompt(&event, jobs, machines, workers));
        self.set_phase(id, DisruptionPhase::Optimizing).await;
        request
    }

    /// Insert a record, pruning the oldest resolved ones past retention.
    async fn track(&self, record: DisruptionRecord) {
        let mut records = self.records.write().await;
        records.insert(record.id, record);

        let excess = records.len().saturating_sub(self.config.record_retention);
        if excess == 0 {
            return;
        }
        let mut resolved: Vec<_> = records
            .values()
            .filter(|r| r.phase.is_terminal())
            .map(|r| (r.event.timestamp, r.id))
            .collect();
        resolved.sort();
        for (_, old) in resolved.into_iter().take(excess) {
            records.remove(&old);
        }
        debug!(kept = records.len(), "Pruned resolved disruptions");
    }

    async fn optimize(&self, id: Uuid, request: RecommendationRequest, guard: InFlight) {
        let result = self.engine.recommend(request).await;
        // The flag tracks the request, not the alert that follows it.
        drop(guard);

        match result {
            Ok(recommendation) => {
                tokio::time::sleep(self.config.settling_delay).await;
                self.resolve_with(id, recommendation).await;
            }
            Err(e) => {
                error!(disruption_id = %id, error = %e, "Recommendation request failed");
                {
                    let mut records = self.records.write().await;
                    if let Some(record) = records.get_mut(&id) {
                        record.failure = Some(e.to_string());
                        record.advance(DisruptionPhase::Resolved);
                    }
                }
            }
        }

        self.session.reload_after_mutation("disruption").await;
    }

    async fn resolve_with(&self, id: Uuid, recommendation: RescheduleRecommendation) {
        let delay = recommendation.delay_or(self.config.default_estimated_delay);
        info!(
            disruption_id = %id,
            estimated_delay = delay,
            actions = recommendation.recommendations.len(),
            "Schedule optimized"
        );

        self.session
            .alerts()
            .prepend(
                Alert::new(
                    AlertKind::Info,
                    "Schedule Optimized",
                    format!(
                        "Production rescheduled with {delay} min delay. AI recommendations applied."
                    ),
                    chrono::Utc::now(),
                )
                .with_origin(AlertOrigin::Disruption),
            )
            .await;

        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.recommendation = Some(recommendation);
            record.advance(DisruptionPhase::Resolved);
        }
    }

    async fn set_phase(&self, id: Uuid, phase: DisruptionPhase) {
        if let Some(record) = self.records.write().await.get_mut(&id) {
            record.advance(phase);
        }
    }
}

/// Holds one unit of the optimizing flag; released on drop.
struct InFlight {
    flag: Arc<OptimizingFlag>,
}

impl InFlight {
    fn acquire(flag: Arc<OptimizingFlag>) -> Self {
        flag.acquire();
        Self { flag }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.release();
    }
}

/// Prompt describing the disruption and the current floor size.
pub fn build_prompt(
    event: &DisruptionEvent,
    jobs: usize,
    machines: usize,
    workers: usize,
) -> String {
    format!(
        "Production disruption occurred: {kind} on {resource}. \
         Current jobs: {jobs}, Available machines: {machines}, Workers: {workers}. \
         Provide immediate rescheduling recommendations to minimize impact.",
        kind = event.kind,
        resource = event.resource,
    )
}
