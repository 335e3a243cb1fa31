//! Dashboard KPIs.
//!
//! | KPI | Definition |
//! |-----|-----------|
//! | Machine Utilization | round(100 × operational / machines), 0 without machines |
//! | Job Throughput | `"{in_progress}/{total}"` |
//! | Available Workers | workers with availability = available |
//! | Overall Efficiency | round(100 × (completed + in_progress) / total), 0 without jobs |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Availability, Job, JobStatus, Machine, MachineStatus, Worker};

use super::history::MetricSample;

/// Rounded percentage that reports 0 instead of dividing by zero.
pub fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 * 100.0 / denominator as f64).round() as u32
}

/// Raw figures behind the KPI cards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorMetrics {
    pub utilization: u32,
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub total_jobs: usize,
    pub efficiency: u32,
    pub available_workers: usize,
}

impl FloorMetrics {
    pub fn calculate(jobs: &[Job], machines: &[Machine], workers: &[Worker]) -> Self {
        let active_jobs = jobs.iter().filter(|j| j.status == JobStatus::InProgress).count();
        let completed_jobs = jobs.iter().filter(|j| j.status == JobStatus::Completed).count();
        let operational = machines
            .iter()
            .filter(|m| m.status == MachineStatus::Operational)
            .count();
        let available_workers = workers
            .iter()
            .filter(|w| w.availability == Availability::Available)
            .count();

        Self {
            utilization: percent(operational, machines.len()),
            active_jobs,
            completed_jobs,
            total_jobs: jobs.len(),
            efficiency: percent(completed_jobs + active_jobs, jobs.len()),
            available_workers,
        }
    }

    /// Throughput as displayed: `"active/total"`.
    pub fn throughput(&self) -> String {
        format!("{}/{}", self.active_jobs, self.total_jobs)
    }

    /// Freeze these figures into a history sample.
    pub fn sample(&self, at: DateTime<Utc>) -> MetricSample {
        MetricSample {
            at,
            utilization: self.utilization as f64,
            efficiency: self.efficiency as f64,
            active_jobs: self.active_jobs,
            available_workers: self.available_workers,
        }
    }
}

/// Styling hint for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiAccent {
    Blue,
    Green,
    Yellow,
    Purple,
}

/// A single KPI card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub title: String,
    pub value: String,
    /// Change against the trailing-window baseline.
    pub trend: f64,
    pub accent: KpiAccent,
}

/// Build the four KPI cards. Trends are deltas against `baseline`, or 0.0 without one.
pub fn build_kpis(metrics: &FloorMetrics, baseline: Option<&MetricSample>) -> Vec<Kpi> {
    let delta = |current: f64, select: fn(&MetricSample) -> f64| {
        baseline
            .map(|b| round_tenth(current - select(b)))
            .unwrap_or(0.0)
    };

    vec![
        Kpi {
            title: "Machine Utilization".into(),
            value: format!("{}%", metrics.utilization),
            trend: delta(metrics.utilization as f64, |b| b.utilization),
            accent: KpiAccent::Blue,
        },
        Kpi {
            title: "Job Throughput".into(),
            value: metrics.throughput(),
            trend: delta(metrics.active_jobs as f64, |b| b.active_jobs as f64),
            accent: KpiAccent::Green,
        },
        Kpi {
            title: "Available Workers".into(),
            value: metrics.available_workers.to_string(),
            trend: delta(metrics.available_workers as f64, |b| b.available_workers as f64),
            accent: KpiAccent::Yellow,
        },
        Kpi {
            title: "Overall Efficiency".into(),
            value: format!("{}%", metrics.efficiency),
            trend: delta(metrics.efficiency as f64, |b| b.efficiency),
            accent: KpiAccent::Purple,
        },
    ]
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewJob, NewMachine, NewWorker};

    fn job(status: JobStatus) -> Job {
        let mut job = NewJob::new("j", 1.0).into_job(Utc::now());
        job.status = status;
        job
    }

    fn machine(status: MachineStatus) -> Machine {
        NewMachine::new("m", "cnc", status).into_machine(Utc::now())
    }

    fn worker(availability: Availability) -> Worker {
        NewWorker::new("w", availability).into_worker(Utc::now())
    }

    #[test]
    fn empty_snapshot_reports_zero_not_nan() {
        let metrics = FloorMetrics::calculate(&[], &[], &[]);
        assert_eq!(metrics.utilization, 0);
        assert_eq!(metrics.efficiency, 0);
        assert_eq!(metrics.throughput(), "0/0");

        let kpis = build_kpis(&metrics, None);
        assert_eq!(kpis[0].value, "0%");
        assert_eq!(kpis[3].value, "0%");
        assert!(kpis.iter().all(|k| k.trend == 0.0));
    }

    #[test]
    fn utilization_counts_operational_machines() {
        let machines = vec![
            machine(MachineStatus::Operational),
            machine(MachineStatus::Operational),
            machine(MachineStatus::Idle),
        ];
        let metrics = FloorMetrics::calculate(&[], &machines, &[]);
        assert_eq!(metrics.utilization, 67);
    }

    #[test]
    fn throughput_is_active_over_total() {
        let jobs = vec![
            job(JobStatus::InProgress),
            job(JobStatus::InProgress),
            job(JobStatus::Completed),
            job(JobStatus::Queued),
            job(JobStatus::Delayed),
        ];
        let metrics = FloorMetrics::calculate(&jobs, &[], &[]);
        assert_eq!(metrics.throughput(), "2/5");
        assert_eq!(metrics.efficiency, 60);
    }

    #[test]
    fn available_workers_counted() {
        let workers = vec![
            worker(Availability::Available),
            worker(Availability::Busy),
            worker(Availability::Available),
            worker(Availability::OnBreak),
        ];
        let kpis = build_kpis(&FloorMetrics::calculate(&[], &[], &workers), None);
        assert_eq!(kpis[2].title, "Available Workers");
        assert_eq!(kpis[2].value, "2");
    }

    #[test]
    fn trend_is_delta_against_baseline() {
        let machines = vec![machine(MachineStatus::Operational), machine(MachineStatus::Idle)];
        let metrics = FloorMetrics::calculate(&[job(JobStatus::InProgress)], &machines, &[]);
        let baseline = MetricSample {
            at: Utc::now(),
            utilization: 40.0,
            efficiency: 100.0,
            active_jobs: 3,
            available_workers: 0,
        };
        let kpis = build_kpis(&metrics, Some(&baseline));
        assert_eq!(kpis[0].trend, 10.0);
        assert_eq!(kpis[1].trend, -2.0);
        assert_eq!(kpis[3].trend, 0.0);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 5), 100);
    }
}
