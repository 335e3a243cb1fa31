//! libSQL backend: durable `EntityStore` implementation.
//!
//! Each record is stored as a JSON document keyed by id, with `created_at`
//! lifted into its own column for ordering. Supports local file and
//! in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::entities::{
    Job, JobPatch, Machine, MachinePatch, NewJob, NewMachine, NewWorker, SortKey, Worker,
    WorkerPatch,
};
use crate::error::StorageError;
use crate::store::migrations;
use crate::store::traits::EntityStore;

const JOBS: &str = "jobs";
const MACHINES: &str = "machines";
const WORKERS: &str = "workers";

/// libSQL-backed entity store.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StorageError::Unavailable(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StorageError> {
        let conn = db
            .connect()
            .map_err(|e| StorageError::Unavailable(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn list_records<T: DeserializeOwned>(
        &self,
        table: &str,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StorageError> {
        let order = match sort {
            SortKey::CreatedAsc => "ASC",
            SortKey::CreatedDesc => "DESC",
        };
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT body FROM {table} ORDER BY created_at {order}, rowid {order} LIMIT ?1"
                ),
                params![limit],
            )
            .await
            .map_err(|e| StorageError::Query(format!("list {table}: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StorageError::Query(format!("list {table}: {e}")))?
        {
            records.push(decode_body(table, &row)?);
        }
        Ok(records)
    }

    async fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT body FROM {table} WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get {table}: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StorageError::Query(format!("get {table}: {e}")))?
        {
            Some(row) => Ok(Some(decode_body(table, &row)?)),
            None => Ok(None),
        }
    }

    async fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        created_at: DateTime<Utc>,
        record: &T,
    ) -> Result<(), StorageError> {
        let body = encode_body(record)?;
        self.conn
            .execute(
                &format!("INSERT INTO {table} (id, created_at, body) VALUES (?1, ?2, ?3)"),
                params![id, created_at.to_rfc3339(), body],
            )
            .await
            .map_err(|e| StorageError::Query(format!("insert {table}: {e}")))?;
        debug!(table = table, id = id, "Record inserted");
        Ok(())
    }

    async fn write_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
    ) -> Result<(), StorageError> {
        let body = encode_body(record)?;
        self.conn
            .execute(
                &format!("UPDATE {table} SET body = ?1 WHERE id = ?2"),
                params![body, id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("update {table}: {e}")))?;
        Ok(())
    }
}

fn encode_body<T: Serialize>(record: &T) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_body<T: DeserializeOwned>(table: &str, row: &libsql::Row) -> Result<T, StorageError> {
    let body: String = row
        .get(0)
        .map_err(|e| StorageError::Query(format!("{table}.body: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| StorageError::Serialization(format!("{table}.body: {e}")))
}

#[async_trait]
impl EntityStore for LibSqlStore {
    async fn list_jobs(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Job>, StorageError> {
        self.list_records(JOBS, sort, limit).await
    }

    async fn create_job(&self, job: NewJob) -> Result<Job, StorageError> {
        let job = job.into_job(Utc::now());
        self.insert_record(JOBS, &job.id, job.created_at, &job).await?;
        Ok(job)
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, StorageError> {
        let mut job: Job = self
            .get_record(JOBS, id)
            .await?
            .ok_or_else(|| StorageError::not_found("job", id))?;
        patch.apply(&mut job);
        self.write_record(JOBS, id, &job).await?;
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        self.get_record(JOBS, id).await
    }

    async fn list_machines(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Machine>, StorageError> {
        self.list_records(MACHINES, sort, limit).await
    }

    async fn create_machine(&self, machine: NewMachine) -> Result<Machine, StorageError> {
        let machine = machine.into_machine(Utc::now());
        self.insert_record(MACHINES, &machine.id, machine.created_at, &machine)
            .await?;
        Ok(machine)
    }

    async fn update_machine(
        &self,
        id: &str,
        patch: &MachinePatch,
    ) -> Result<Machine, StorageError> {
        let mut machine: Machine = self
            .get_record(MACHINES, id)
            .await?
            .ok_or_else(|| StorageError::not_found("machine", id))?;
        patch.apply(&mut machine);
        self.write_record(MACHINES, id, &machine).await?;
        Ok(machine)
    }

    async fn list_workers(
        &self,
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Worker>, StorageError> {
        self.list_records(WORKERS, sort, limit).await
    }

    async fn create_worker(&self, worker: NewWorker) -> Result<Worker, StorageError> {
        let worker = worker.into_worker(Utc::now());
        self.insert_record(WORKERS, &worker.id, worker.created_at, &worker)
            .await?;
        Ok(worker)
    }

    async fn update_worker(
        &self,
        id: &str,
        patch: &WorkerPatch,
    ) -> Result<Worker, StorageError> {
        let mut worker: Worker = self
            .get_record(WORKERS, id)
            .await?
            .ok_or_else(|| StorageError::not_found("worker", id))?;
        patch.apply(&mut worker);
        self.write_record(WORKERS, id, &worker).await?;
        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Availability, JobStatus, MachineStatus};

    #[tokio::test]
    async fn job_create_update_list() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let first = store.create_job(NewJob::new("first", 2.0)).await.unwrap();
        let second = store.create_job(NewJob::new("second", 3.0)).await.unwrap();

        let updated = store
            .update_job(&first.id, &JobPatch::assign_machine("m-9"))
            .await
            .unwrap();
        assert_eq!(updated.assigned_machine.as_deref(), Some("m-9"));

        let desc = store.list_jobs(SortKey::CreatedDesc, None).await.unwrap();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc[0].id, second.id);
        assert_eq!(desc[1].assigned_machine.as_deref(), Some("m-9"));
        assert_eq!(desc[1].status, JobStatus::Queued);

        let limited = store.list_jobs(SortKey::CreatedAsc, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, first.id);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let err = store
            .update_machine("nope", &MachinePatch::status(MachineStatus::Idle))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floor.db");

        let machine_id = {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store
                .create_worker(NewWorker::new("Ana", Availability::Available))
                .await
                .unwrap();
            store
                .create_machine(NewMachine::new("CNC-02", "cnc", MachineStatus::Operational))
                .await
                .unwrap()
                .id
        };

        let store = LibSqlStore::new_local(&path).await.unwrap();
        let machines = store.list_machines(SortKey::CreatedAsc, None).await.unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].id, machine_id);
        assert_eq!(machines[0].name, "CNC-02");
        let workers = store.list_workers(SortKey::CreatedAsc, None).await.unwrap();
        assert_eq!(workers[0].availability, Availability::Available);
    }
}
