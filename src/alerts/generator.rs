//! Alert rules over a job/machine snapshot.
//!
//! Rules are evaluated independently and may all fire together:
//! 1. any delayed job → one `warning` citing the count
//! 2. any broken-down machine → one `critical` listing machine names
//! 3. more than `idle_machine_threshold` idle machines → one `info`
//!
//! Emission order is always rule 1, 2, 3.

use chrono::{DateTime, Utc};

use crate::entities::{Job, JobStatus, Machine, MachineStatus};

use super::model::{Alert, AlertKind};

/// Default idle-machine threshold (rule 3 fires above it).
pub const DEFAULT_IDLE_MACHINE_THRESHOLD: usize = 2;

/// Tunables for the alert rules.
#[derive(Debug, Clone, Copy)]
pub struct AlertRules {
    pub idle_machine_threshold: usize,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            idle_machine_threshold: DEFAULT_IDLE_MACHINE_THRESHOLD,
        }
    }
}

impl AlertRules {
    /// Derive alerts from a snapshot. Every alert is stamped with `now`.
    pub fn generate(&self, jobs: &[Job], machines: &[Machine], now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let delayed = jobs.iter().filter(|j| j.status == JobStatus::Delayed).count();
        if delayed > 0 {
            alerts.push(Alert::new(
                AlertKind::Warning,
                "Jobs Delayed",
                format!("{delayed} jobs are behind schedule"),
                now,
            ));
        }

        let broken: Vec<&str> = machines
            .iter()
            .filter(|m| m.status == MachineStatus::Breakdown)
            .map(|m| m.name.as_str())
            .collect();
        if !broken.is_empty() {
            alerts.push(Alert::new(
                AlertKind::Critical,
                "Machine Breakdown",
                format!("{} requires attention", broken.join(", ")),
                now,
            ));
        }

        let idle = machines.iter().filter(|m| m.status == MachineStatus::Idle).count();
        if idle > self.idle_machine_threshold {
            alerts.push(Alert::new(
                AlertKind::Info,
                "Optimization Opportunity",
                format!("{idle} machines are idle - consider job reallocation"),
                now,
            ));
        }

        alerts
    }
}

/// Derive alerts with the default rules, stamped with the current time.
pub fn generate_alerts(jobs: &[Job], machines: &[Machine]) -> Vec<Alert> {
    AlertRules::default().generate(jobs, machines, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewJob, NewMachine};

    fn job(status: JobStatus) -> Job {
        let mut job = NewJob::new("job", 1.0).into_job(Utc::now());
        job.status = status;
        job
    }

    fn machine(name: &str, status: MachineStatus) -> Machine {
        NewMachine::new(name, "cnc", status).into_machine(Utc::now())
    }

    #[test]
    fn empty_snapshot_has_no_alerts() {
        assert!(generate_alerts(&[], &[]).is_empty());
    }

    #[test]
    fn delayed_jobs_produce_single_warning() {
        let jobs = vec![
            job(JobStatus::Delayed),
            job(JobStatus::Delayed),
            job(JobStatus::Delayed),
            job(JobStatus::Queued),
        ];
        let machines = vec![machine("CNC-01", MachineStatus::Idle)];

        let alerts = generate_alerts(&jobs, &machines);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Warning);
        assert!(alerts[0].message.contains('3'));
    }

    #[test]
    fn breakdown_names_the_machine() {
        let machines = vec![
            machine("CNC-01", MachineStatus::Operational),
            machine("CNC-02", MachineStatus::Breakdown),
        ];
        let alerts = generate_alerts(&[job(JobStatus::InProgress)], &machines);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Critical);
        assert!(alerts[0].message.contains("CNC-02"));
        assert!(!alerts[0].message.contains("CNC-01"));
    }

    #[test]
    fn breakdown_names_are_comma_joined() {
        let machines = vec![
            machine("Press-1", MachineStatus::Breakdown),
            machine("Lathe-4", MachineStatus::Breakdown),
        ];
        let alerts = generate_alerts(&[], &machines);
        assert_eq!(alerts[0].message, "Press-1, Lathe-4 requires attention");
    }

    #[test]
    fn idle_rule_needs_more_than_threshold() {
        let two_idle = vec![machine("a", MachineStatus::Idle), machine("b", MachineStatus::Idle)];
        assert!(generate_alerts(&[], &two_idle).is_empty());

        let mut three_idle = two_idle.clone();
        three_idle.push(machine("c", MachineStatus::Idle));
        let alerts = generate_alerts(&[], &three_idle);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Info);
        assert!(alerts[0].message.starts_with("3 machines are idle"));
    }

    #[test]
    fn all_rules_fire_in_order() {
        let jobs = vec![job(JobStatus::Delayed)];
        let machines = vec![
            machine("X", MachineStatus::Breakdown),
            machine("a", MachineStatus::Idle),
            machine("b", MachineStatus::Idle),
            machine("c", MachineStatus::Idle),
        ];
        let now = Utc::now();
        let alerts = AlertRules::default().generate(&jobs, &machines, now);
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Warning, AlertKind::Critical, AlertKind::Info]);
        assert!(alerts.iter().all(|a| a.timestamp == now));
    }

    #[test]
    fn custom_threshold() {
        let rules = AlertRules {
            idle_machine_threshold: 0,
        };
        let alerts = rules.generate(&[], &[machine("a", MachineStatus::Idle)], Utc::now());
        assert_eq!(alerts.len(), 1);
    }
}
