//! Rolling history of metric samples.
//!
//! Each reload records one sample. Trends and the weekly series are computed
//! from these samples, so identical histories always give identical output.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Samples older than this are dropped.
const MAX_AGE_DAYS: i64 = 8;

/// Hard cap on stored samples.
const MAX_SAMPLES: usize = 10_000;

/// One recorded point of floor metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub at: DateTime<Utc>,
    pub utilization: f64,
    pub efficiency: f64,
    pub active_jobs: usize,
    pub available_workers: usize,
}

/// Per-day averages for the weekly trend chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    /// Short weekday name (`Mon`..`Sun`).
    pub day: String,
    pub efficiency: u32,
    pub utilization: u32,
}

/// Time-ordered sample store.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    samples: VecDeque<MetricSample>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample. Out-of-order samples are inserted at their position.
    pub fn record(&mut self, sample: MetricSample) {
        let pos = self
            .samples
            .iter()
            .rposition(|s| s.at <= sample.at)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.samples.insert(pos, sample);

        let horizon = sample.at - Duration::days(MAX_AGE_DAYS);
        while self.samples.front().is_some_and(|s| s.at < horizon) {
            self.samples.pop_front();
        }
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Oldest sample inside `[now - window, now]`.
    pub fn baseline(&self, now: DateTime<Utc>, window: Duration) -> Option<&MetricSample> {
        let start = now - window;
        self.samples.iter().find(|s| s.at >= start && s.at <= now)
    }

    /// Seven daily averages ending with `now`'s day (oldest first). Days with
    /// no samples report zero.
    pub fn weekly_trend(&self, now: DateTime<Utc>) -> Vec<DailyTrend> {
        (0..7)
            .rev()
            .map(|offset| {
                let date = (now - Duration::days(offset)).date_naive();
                let day: Vec<&MetricSample> = self
                    .samples
                    .iter()
                    .filter(|s| s.at.date_naive() == date)
                    .collect();
                let avg = |select: fn(&MetricSample) -> f64| {
                    if day.is_empty() {
                        0
                    } else {
                        (day.iter().map(|s| select(s)).sum::<f64>() / day.len() as f64).round()
                            as u32
                    }
                };
                DailyTrend {
                    day: date.weekday().to_string(),
                    efficiency: avg(|s| s.efficiency),
                    utilization: avg(|s| s.utilization),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(at: DateTime<Utc>, utilization: f64) -> MetricSample {
        MetricSample {
            at,
            utilization,
            efficiency: utilization / 2.0,
            active_jobs: 0,
            available_workers: 0,
        }
    }

    #[test]
    fn baseline_is_oldest_sample_in_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let mut history = SnapshotHistory::new();
        history.record(sample(now - Duration::hours(30), 10.0));
        history.record(sample(now - Duration::hours(20), 20.0));
        history.record(sample(now - Duration::hours(1), 30.0));

        let base = history.baseline(now, Duration::hours(24)).unwrap();
        assert_eq!(base.utilization, 20.0);
        assert!(history.baseline(now, Duration::minutes(10)).is_none());
    }

    #[test]
    fn out_of_order_samples_are_sorted() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let mut history = SnapshotHistory::new();
        history.record(sample(now, 3.0));
        history.record(sample(now - Duration::hours(2), 1.0));
        let base = history.baseline(now, Duration::hours(5)).unwrap();
        assert_eq!(base.utilization, 1.0);
    }

    #[test]
    fn old_samples_are_pruned() {
        let now = Utc.with_ymd_and_hms(2026, 3, 20, 0, 0, 0).unwrap();
        let mut history = SnapshotHistory::new();
        history.record(sample(now - Duration::days(10), 1.0));
        history.record(sample(now, 2.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn weekly_trend_averages_per_day() {
        // 2026-03-04 is a Wednesday
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 18, 0, 0).unwrap();
        let mut history = SnapshotHistory::new();
        history.record(sample(now - Duration::hours(2), 80.0));
        history.record(sample(now - Duration::hours(1), 90.0));
        history.record(sample(now - Duration::days(1), 50.0));

        let trend = history.weekly_trend(now);
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[6].day, "Wed");
        assert_eq!(trend[6].utilization, 85);
        assert_eq!(trend[6].efficiency, 43);
        assert_eq!(trend[5].day, "Tue");
        assert_eq!(trend[5].utilization, 50);
        assert_eq!(trend[0].utilization, 0);
    }

    #[test]
    fn weekly_trend_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 18, 0, 0).unwrap();
        let mut history = SnapshotHistory::new();
        history.record(sample(now, 70.0));
        assert_eq!(history.weekly_trend(now), history.weekly_trend(now));
    }
}
