//! Floor metrics: KPI cards, analytics roll-ups, and the sample history
//! their trends are computed from.

pub mod analytics;
pub mod history;
pub mod kpi;

pub use analytics::Analytics;
pub use history::{DailyTrend, MetricSample, SnapshotHistory};
pub use kpi::{FloorMetrics, Kpi, KpiAccent, build_kpis};
