//! Floor records: jobs, machines, workers, and their partial updates.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Job priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All priorities, most urgent first.
    pub const ALL: [Priority; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Delayed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "delayed" => Ok(Self::Delayed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Machine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Operational,
    Maintenance,
    Breakdown,
    Idle,
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operational => write!(f, "operational"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Breakdown => write!(f, "breakdown"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Worker availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Busy,
    Absent,
    #[serde(rename = "break")]
    OnBreak,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Busy => write!(f, "busy"),
            Self::Absent => write!(f, "absent"),
            Self::OnBreak => write!(f, "break"),
        }
    }
}

/// Ordering requested from the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Oldest record first.
    #[default]
    CreatedAsc,
    /// Newest record first (`-created_date`).
    CreatedDesc,
}

impl std::str::FromStr for SortKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_date" => Ok(Self::CreatedAsc),
            "-created_date" => Ok(Self::CreatedDesc),
            _ => Err(format!("Unknown sort key: {}", s)),
        }
    }
}

/// A production job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    /// Planned duration in hours.
    pub duration: f64,
    #[serde(default)]
    pub priority: Priority,
    pub status: JobStatus,
    /// Free-form machine category (cnc, assembly, ...).
    pub machine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A machine on the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub machine_type: String,
    #[serde(default)]
    pub location: String,
    pub capacity: f64,
    #[serde(default)]
    pub current_load: f64,
    /// 0-100.
    #[serde(default)]
    pub efficiency_rating: f64,
    pub status: MachineStatus,
    pub created_at: DateTime<Utc>,
}

impl Machine {
    /// Load as a percentage of capacity, 0 when capacity is 0.
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity > 0.0 {
            self.current_load / self.capacity * 100.0
        } else {
            0.0
        }
    }
}

/// A floor worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shift: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub availability: Availability,
    /// 0-100.
    #[serde(default)]
    pub efficiency_rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a job about to be created. New jobs always start `queued`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub duration: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
}

fn default_machine_type() -> String {
    "cnc".to_string()
}

impl NewJob {
    pub fn new(title: impl Into<String>, duration: f64) -> Self {
        Self {
            title: title.into(),
            duration,
            priority: Priority::default(),
            machine_type: default_machine_type(),
            required_skills: BTreeSet::new(),
        }
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set machine type.
    pub fn with_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = machine_type.into();
        self
    }

    /// Builder: add a required skill.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skills.insert(skill.into());
        self
    }

    /// Reject empty titles and non-positive or non-finite durations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_title(&self.title)?;
        check_duration(self.duration)
    }

    /// Materialize the record with a fresh id.
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        Job {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            duration: self.duration,
            priority: self.priority,
            status: JobStatus::Queued,
            machine_type: self.machine_type,
            assigned_machine: None,
            assigned_worker: None,
            required_skills: self.required_skills,
            start_time: None,
            end_time: None,
            created_at: now,
        }
    }
}

/// Fields for a machine about to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMachine {
    pub name: String,
    #[serde(rename = "type")]
    pub machine_type: String,
    #[serde(default)]
    pub location: String,
    pub capacity: f64,
    #[serde(default)]
    pub current_load: f64,
    #[serde(default)]
    pub efficiency_rating: f64,
    pub status: MachineStatus,
}

impl NewMachine {
    pub fn new(name: impl Into<String>, machine_type: impl Into<String>, status: MachineStatus) -> Self {
        Self {
            name: name.into(),
            machine_type: machine_type.into(),
            location: String::new(),
            capacity: 100.0,
            current_load: 0.0,
            efficiency_rating: 0.0,
            status,
        }
    }

    /// Builder: set load and capacity.
    pub fn with_load(mut self, current_load: f64, capacity: f64) -> Self {
        self.current_load = current_load;
        self.capacity = capacity;
        self
    }

    /// Builder: set efficiency rating.
    pub fn with_efficiency(mut self, rating: f64) -> Self {
        self.efficiency_rating = rating;
        self
    }

    pub fn into_machine(self, now: DateTime<Utc>) -> Machine {
        Machine {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            machine_type: self.machine_type,
            location: self.location,
            capacity: self.capacity,
            current_load: self.current_load,
            efficiency_rating: self.efficiency_rating,
            status: self.status,
            created_at: now,
        }
    }
}

/// Fields for a worker about to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorker {
    pub name: String,
    #[serde(default)]
    pub shift: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub availability: Availability,
    #[serde(default)]
    pub efficiency_rating: f64,
}

impl NewWorker {
    pub fn new(name: impl Into<String>, availability: Availability) -> Self {
        Self {
            name: name.into(),
            shift: String::new(),
            skills: BTreeSet::new(),
            availability,
            efficiency_rating: 0.0,
        }
    }

    /// Builder: set efficiency rating.
    pub fn with_efficiency(mut self, rating: f64) -> Self {
        self.efficiency_rating = rating;
        self
    }

    pub fn into_worker(self, now: DateTime<Utc>) -> Worker {
        Worker {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            shift: self.shift,
            skills: self.skills,
            availability: self.availability,
            efficiency_rating: self.efficiency_rating,
            current_job: None,
            created_at: now,
        }
    }
}

/// Partial job update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl JobPatch {
    /// Patch that only moves the job to another machine.
    pub fn assign_machine(machine_id: impl Into<String>) -> Self {
        Self {
            assigned_machine: Some(machine_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check a client-supplied patch.
    ///
    /// `start_time` and `end_time` only change through status transitions, so
    /// a patch carrying either is rejected.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref title) = self.title {
            check_title(title)?;
        }
        if let Some(duration) = self.duration {
            check_duration(duration)?;
        }
        for (field, value) in [("start_time", self.start_time), ("end_time", self.end_time)] {
            if value.is_some() {
                return Err(ValidationError::InvalidField {
                    field: field.into(),
                    reason: "set by status changes, not directly".into(),
                });
            }
        }
        Ok(())
    }

    /// Overlay every set field onto `job`.
    pub fn apply(&self, job: &mut Job) {
        if let Some(ref title) = self.title {
            job.title = title.clone();
        }
        if let Some(duration) = self.duration {
            job.duration = duration;
        }
        if let Some(priority) = self.priority {
            job.priority = priority;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref machine_type) = self.machine_type {
            job.machine_type = machine_type.clone();
        }
        if let Some(ref machine) = self.assigned_machine {
            job.assigned_machine = Some(machine.clone());
        }
        if let Some(ref worker) = self.assigned_worker {
            job.assigned_worker = Some(worker.clone());
        }
        if let Some(ref skills) = self.required_skills {
            job.required_skills = skills.clone();
        }
        if let Some(start) = self.start_time {
            job.start_time = Some(start);
        }
        if let Some(end) = self.end_time {
            job.end_time = Some(end);
        }
    }
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "title".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

fn check_duration(duration: f64) -> Result<(), ValidationError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ValidationError::InvalidField {
            field: "duration".into(),
            reason: format!("must be a positive number of hours, got {duration}"),
        });
    }
    Ok(())
}

/// Partial machine update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachinePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MachineStatus>,
}

impl MachinePatch {
    pub fn status(status: MachineStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, machine: &mut Machine) {
        if let Some(ref name) = self.name {
            machine.name = name.clone();
        }
        if let Some(ref location) = self.location {
            machine.location = location.clone();
        }
        if let Some(capacity) = self.capacity {
            machine.capacity = capacity;
        }
        if let Some(load) = self.current_load {
            machine.current_load = load;
        }
        if let Some(rating) = self.efficiency_rating {
            machine.efficiency_rating = rating;
        }
        if let Some(status) = self.status {
            machine.status = status;
        }
    }
}

/// Partial worker update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<String>,
}

impl WorkerPatch {
    pub fn availability(availability: Availability) -> Self {
        Self {
            availability: Some(availability),
            ..Self::default()
        }
    }

    pub fn apply(&self, worker: &mut Worker) {
        if let Some(ref shift) = self.shift {
            worker.shift = shift.clone();
        }
        if let Some(ref skills) = self.skills {
            worker.skills = skills.clone();
        }
        if let Some(availability) = self.availability {
            worker.availability = availability;
        }
        if let Some(rating) = self.efficiency_rating {
            worker.efficiency_rating = rating;
        }
        if let Some(ref job) = self.current_job {
            worker.current_job = Some(job.clone());
        }
    }
}
