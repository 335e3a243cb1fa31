//! Floor Control: production-floor scheduling and disruption response core.

pub mod alerts;
pub mod api;
pub mod config;
pub mod disruption;
pub mod entities;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod reassign;
pub mod recommend;
pub mod seed;
pub mod session;
pub mod store;
