//! Seed fixture loading for an empty store.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::entities::{NewJob, NewMachine, NewWorker, SortKey};
use crate::error::{ConfigError, StorageError};
use crate::store::EntityStore;

/// Records to create in a fresh store.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub jobs: Vec<NewJob>,
    #[serde(default)]
    pub machines: Vec<NewMachine>,
    #[serde(default)]
    pub workers: Vec<NewWorker>,
}

impl SeedData {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let seed_error = |reason: String| ConfigError::Seed {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        Self::from_json(&raw).map_err(|e| seed_error(e.to_string()))
    }

    /// Create every record, but only if the store holds none yet.
    ///
    /// Returns whether anything was written.
    pub async fn apply(self, store: &dyn EntityStore) -> Result<bool, StorageError> {
        let (jobs, machines, workers) = tokio::try_join!(
            store.list_jobs(SortKey::CreatedAsc, Some(1)),
            store.list_machines(SortKey::CreatedAsc, Some(1)),
            store.list_workers(SortKey::CreatedAsc, Some(1)),
        )?;
        if !jobs.is_empty() || !machines.is_empty() || !workers.is_empty() {
            info!("Store already populated, skipping seed");
            return Ok(false);
        }

        let counts = (self.jobs.len(), self.machines.len(), self.workers.len());
        for machine in self.machines {
            store.create_machine(machine).await?;
        }
        for worker in self.workers {
            store.create_worker(worker).await?;
        }
        for job in self.jobs {
            store.create_job(job).await?;
        }
        info!(
            jobs = counts.0,
            machines = counts.1,
            workers = counts.2,
            "Store seeded"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Availability, MachineStatus, Priority};
    use crate::store::MemoryStore;

    const FIXTURE: &str = r#"{
        "jobs": [{"title": "Gear housing", "duration": 4.5, "priority": "high"}],
        "machines": [{"name": "CNC-01", "type": "cnc", "capacity": 100, "status": "operational"}],
        "workers": [{"name": "Ana", "availability": "break", "skills": ["welding"]}]
    }"#;

    #[test]
    fn parses_fixture_with_defaults() {
        let seed = SeedData::from_json(FIXTURE).unwrap();
        assert_eq!(seed.jobs[0].priority, Priority::High);
        assert_eq!(seed.jobs[0].machine_type, "cnc");
        assert_eq!(seed.machines[0].status, MachineStatus::Operational);
        assert_eq!(seed.workers[0].availability, Availability::OnBreak);
    }

    #[tokio::test]
    async fn applies_only_to_empty_store() {
        let store = MemoryStore::new();
        assert!(SeedData::from_json(FIXTURE).unwrap().apply(&store).await.unwrap());
        assert!(!SeedData::from_json(FIXTURE).unwrap().apply(&store).await.unwrap());

        let jobs = store.list_jobs(SortKey::CreatedAsc, None).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = SeedData::load(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Seed { .. }));
    }
}
