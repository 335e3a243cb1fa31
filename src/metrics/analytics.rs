//! Analytics and resource roll-ups for reporting views.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Availability, Job, JobStatus, Machine, MachineStatus, Priority, Worker};

use super::history::{DailyTrend, SnapshotHistory};
use super::kpi::percent;

/// Completed jobs per hour of day against the hourly target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyThroughput {
    pub hour: String,
    pub completed: usize,
    pub target: u32,
}

/// Load of a single machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineUtilization {
    pub name: String,
    pub utilization: u32,
    pub capacity: f64,
    pub current: f64,
}

/// Number of jobs at a given priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub name: Priority,
    pub value: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub delayed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineStats {
    pub total: usize,
    pub operational: usize,
    pub maintenance: usize,
    pub breakdown: usize,
    pub idle: usize,
    pub avg_utilization: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
    pub absent: usize,
    pub on_break: usize,
    pub avg_efficiency: u32,
}

/// Everything the analytics and resources views show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub hourly_throughput: Vec<HourlyThroughput>,
    pub machine_utilization: Vec<MachineUtilization>,
    pub jobs_by_priority: Vec<PriorityCount>,
    pub efficiency_trend: Vec<DailyTrend>,
    pub job_stats: JobStats,
    pub machine_stats: MachineStats,
    pub worker_stats: WorkerStats,
    pub avg_machine_efficiency: u32,
    pub on_time_rate: u32,
}

impl Analytics {
    pub fn calculate(
        jobs: &[Job],
        machines: &[Machine],
        workers: &[Worker],
        history: &SnapshotHistory,
        now: DateTime<Utc>,
        hourly_target: u32,
    ) -> Self {
        let machine_utilization = machines
            .iter()
            .map(|m| MachineUtilization {
                name: m.name.clone(),
                utilization: m.utilization_percent().round() as u32,
                capacity: m.capacity,
                current: m.current_load,
            })
            .collect();

        let jobs_by_priority = Priority::ALL
            .iter()
            .map(|p| PriorityCount {
                name: *p,
                value: jobs.iter().filter(|j| j.priority == *p).count(),
            })
            .filter(|c| c.value > 0)
            .collect();

        Self {
            hourly_throughput: hourly_throughput(jobs, now, hourly_target),
            machine_utilization,
            jobs_by_priority,
            efficiency_trend: history.weekly_trend(now),
            job_stats: job_stats(jobs),
            machine_stats: machine_stats(machines),
            worker_stats: worker_stats(workers),
            avg_machine_efficiency: average(machines.iter().map(|m| m.efficiency_rating)),
            on_time_rate: on_time_rate(jobs),
        }
    }
}

/// Rounded mean that reports 0 for an empty input.
fn average(values: impl Iterator<Item = f64>) -> u32 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0
    } else {
        (sum / count as f64).round() as u32
    }
}

/// Completions in the 24 hours before `now`, bucketed by hour of day.
pub fn hourly_throughput(jobs: &[Job], now: DateTime<Utc>, target: u32) -> Vec<HourlyThroughput> {
    let since = now - Duration::hours(24);
    let mut buckets = [0usize; 24];
    for end in jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .filter_map(|j| j.end_time)
        .filter(|end| *end > since && *end <= now)
    {
        buckets[end.hour() as usize] += 1;
    }

    buckets
        .iter()
        .enumerate()
        .map(|(hour, completed)| HourlyThroughput {
            hour: format!("{hour}:00"),
            completed: *completed,
            target,
        })
        .collect()
}

pub fn job_stats(jobs: &[Job]) -> JobStats {
    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    JobStats {
        total: jobs.len(),
        queued: count(JobStatus::Queued),
        in_progress: count(JobStatus::InProgress),
        completed: count(JobStatus::Completed),
        delayed: count(JobStatus::Delayed),
    }
}

pub fn machine_stats(machines: &[Machine]) -> MachineStats {
    let count = |status: MachineStatus| machines.iter().filter(|m| m.status == status).count();
    MachineStats {
        total: machines.len(),
        operational: count(MachineStatus::Operational),
        maintenance: count(MachineStatus::Maintenance),
        breakdown: count(MachineStatus::Breakdown),
        idle: count(MachineStatus::Idle),
        avg_utilization: average(machines.iter().map(Machine::utilization_percent)),
    }
}

pub fn worker_stats(workers: &[Worker]) -> WorkerStats {
    let count = |a: Availability| workers.iter().filter(|w| w.availability == a).count();
    WorkerStats {
        total: workers.len(),
        available: count(Availability::Available),
        busy: count(Availability::Busy),
        absent: count(Availability::Absent),
        on_break: count(Availability::OnBreak),
        avg_efficiency: average(workers.iter().map(|w| w.efficiency_rating)),
    }
}

/// Share of completed jobs (with both timestamps) that finished within their
/// planned duration.
pub fn on_time_rate(jobs: &[Job]) -> u32 {
    let mut counted = 0;
    let mut on_time = 0;
    for job in jobs.iter().filter(|j| j.status == JobStatus::Completed) {
        if let (Some(start), Some(end)) = (job.start_time, job.end_time) {
            counted += 1;
            let elapsed_hours = (end - start).num_seconds() as f64 / 3600.0;
            if elapsed_hours <= job.duration {
                on_time += 1;
            }
        }
    }
    percent(on_time, counted)
}
