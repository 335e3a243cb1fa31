//! Operational alerts: rules, value type, and the in-memory feed.

pub mod feed;
pub mod generator;
pub mod model;

pub use feed::AlertFeed;
pub use generator::{AlertRules, generate_alerts};
pub use model::{Alert, AlertKind, AlertOrigin, FeedEvent};
