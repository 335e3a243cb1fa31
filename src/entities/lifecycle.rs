//! Job lifecycle policy.
//!
//! The standard path is `queued → in_progress → {completed, delayed}` with
//! `delayed → in_progress` as recovery. `completed` is terminal. Other moves
//! between non-terminal states are accepted as plain status overwrites; the
//! entity store stays the system of record.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entities::model::{Job, JobPatch, JobStatus};
use crate::error::LifecycleError;

impl JobStatus {
    /// Whether `self → target` is an edge of the standard lifecycle.
    pub fn is_standard_transition(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Queued, InProgress)
                | (InProgress, Completed)
                | (InProgress, Delayed)
                | (Delayed, InProgress)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the job counts as active work.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Compute the patch that moves `job` to `target` at time `now`.
///
/// Side effects are expressed as patch fields: the first entry into
/// `in_progress` stamps `start_time`, entry into `completed` stamps `end_time`.
/// Re-applying the current status yields an empty patch.
pub fn transition(
    job: &Job,
    target: JobStatus,
    now: DateTime<Utc>,
) -> Result<JobPatch, LifecycleError> {
    if job.status == target {
        return Ok(JobPatch::default());
    }

    let reject = |reason: &str| LifecycleError::InvalidTransition {
        id: job.id.clone(),
        from: job.status.to_string(),
        to: target.to_string(),
        reason: reason.to_string(),
    };

    if job.status.is_terminal() {
        return Err(reject("completed jobs are terminal"));
    }

    let mut patch = JobPatch {
        status: Some(target),
        ..JobPatch::default()
    };

    match target {
        JobStatus::Queued => {
            if job.start_time.is_some() {
                return Err(reject("a started job cannot return to the queue"));
            }
        }
        JobStatus::InProgress => {
            if job.start_time.is_none() {
                patch.start_time = Some(now);
            }
        }
        JobStatus::Completed => {
            if job.start_time.is_none() {
                return Err(reject("start_time is unset"));
            }
            patch.end_time = Some(now);
        }
        JobStatus::Delayed => {}
    }

    if !job.status.is_standard_transition(target) {
        debug!(
            job_id = %job.id,
            from = %job.status,
            to = %target,
            "Free-form status overwrite"
        );
    }

    Ok(patch)
}

/// Apply a transition in place. Convenience for in-memory copies.
pub fn apply_transition(
    job: &mut Job,
    target: JobStatus,
    now: DateTime<Utc>,
) -> Result<JobPatch, LifecycleError> {
    let patch = transition(job, target, now)?;
    patch.apply(job);
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::model::NewJob;
    use chrono::Duration;

    fn queued_job() -> Job {
        NewJob::new("Gear blank", 3.0).into_job(Utc::now())
    }

    #[test]
    fn standard_edges() {
        assert!(JobStatus::Queued.is_standard_transition(JobStatus::InProgress));
        assert!(JobStatus::InProgress.is_standard_transition(JobStatus::Completed));
        assert!(JobStatus::InProgress.is_standard_transition(JobStatus::Delayed));
        assert!(JobStatus::Delayed.is_standard_transition(JobStatus::InProgress));
        assert!(!JobStatus::Queued.is_standard_transition(JobStatus::Completed));
        assert!(!JobStatus::Completed.is_standard_transition(JobStatus::InProgress));
    }

    #[test]
    fn starting_a_queued_job_stamps_start_time() {
        let mut job = queued_job();
        let now = Utc::now();
        let patch = apply_transition(&mut job, JobStatus::InProgress, now).unwrap();
        assert_eq!(patch.start_time, Some(now));
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.start_time, Some(now));
        assert!(job.end_time.is_none());
    }

    #[test]
    fn recovery_keeps_original_start_time() {
        let mut job = queued_job();
        let started = Utc::now() - Duration::hours(2);
        apply_transition(&mut job, JobStatus::InProgress, started).unwrap();
        apply_transition(&mut job, JobStatus::Delayed, Utc::now()).unwrap();

        let patch = apply_transition(&mut job, JobStatus::InProgress, Utc::now()).unwrap();
        assert!(patch.start_time.is_none());
        assert_eq!(job.start_time, Some(started));
    }

    #[test]
    fn completing_without_start_time_is_rejected() {
        let job = queued_job();
        let err = transition(&job, JobStatus::Completed, Utc::now()).unwrap_err();
        let LifecycleError::InvalidTransition { from, to, .. } = err;
        assert_eq!(from, "queued");
        assert_eq!(to, "completed");
    }

    #[test]
    fn completing_stamps_end_time() {
        let mut job = queued_job();
        apply_transition(&mut job, JobStatus::InProgress, Utc::now()).unwrap();
        let done = Utc::now();
        apply_transition(&mut job, JobStatus::Completed, done).unwrap();
        assert_eq!(job.end_time, Some(done));
        assert!(job.start_time.unwrap() <= done);
    }

    #[test]
    fn completed_is_terminal() {
        let mut job = queued_job();
        apply_transition(&mut job, JobStatus::InProgress, Utc::now()).unwrap();
        apply_transition(&mut job, JobStatus::Completed, Utc::now()).unwrap();
        assert!(transition(&job, JobStatus::InProgress, Utc::now()).is_err());
        assert!(transition(&job, JobStatus::Delayed, Utc::now()).is_err());
    }

    #[test]
    fn same_status_is_a_no_op() {
        let job = queued_job();
        assert!(transition(&job, JobStatus::Queued, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn free_form_overwrite_is_accepted() {
        let mut job = queued_job();
        let patch = apply_transition(&mut job, JobStatus::Delayed, Utc::now()).unwrap();
        assert_eq!(patch.status, Some(JobStatus::Delayed));
        assert!(job.start_time.is_none());
    }

    #[test]
    fn started_job_cannot_be_requeued() {
        let mut job = queued_job();
        apply_transition(&mut job, JobStatus::InProgress, Utc::now()).unwrap();
        assert!(transition(&job, JobStatus::Queued, Utc::now()).is_err());
    }
}
