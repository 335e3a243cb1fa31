//! Disruption response: events, per-instance phases, the optimizing flag,
//! and the orchestrator that drives them.

pub mod flag;
pub mod model;
pub mod orchestrator;

pub use flag::OptimizingFlag;
pub use model::{DisruptionEvent, DisruptionPhase, DisruptionRecord};
pub use orchestrator::{
    DisruptionOrchestrator, DisruptionTicket, OrchestratorConfig, build_prompt,
};
