//! Disruption events and the per-instance state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recommend::RescheduleRecommendation;

/// An equipment failure, absence, or similar event needing a new schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionEvent {
    /// Free-form category, e.g. "Machine Breakdown".
    #[serde(rename = "type")]
    pub kind: String,
    /// Identifier or name of the affected resource.
    pub resource: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DisruptionEvent {
    pub fn new(kind: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            resource: resource.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Phase of one disruption instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionPhase {
    Idle,
    /// Critical alert raised, optimizing flag held.
    Triaging,
    /// Recommendation request in flight.
    Optimizing,
    Resolved,
}

impl DisruptionPhase {
    pub fn can_transition_to(&self, target: DisruptionPhase) -> bool {
        use DisruptionPhase::*;

        matches!(
            (self, target),
            (Idle, Triaging) | (Triaging, Optimizing) | (Optimizing, Resolved)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}

impl std::fmt::Display for DisruptionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Triaging => "triaging",
            Self::Optimizing => "optimizing",
            Self::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

/// Tracked state of one disruption instance.
#[derive(Debug, Clone, Serialize)]
pub struct DisruptionRecord {
    pub id: Uuid,
    pub event: DisruptionEvent,
    pub phase: DisruptionPhase,
    /// Set when the engine answered with a conforming plan.
    pub recommendation: Option<RescheduleRecommendation>,
    /// Set when the engine call failed.
    pub failure: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DisruptionRecord {
    pub fn new(event: DisruptionEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            phase: DisruptionPhase::Idle,
            recommendation: None,
            failure: None,
            resolved_at: None,
        }
    }

    /// Move to `target`, ignoring anything the state machine does not allow.
    pub fn advance(&mut self, target: DisruptionPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            tracing::warn!(
                disruption_id = %self.id,
                from = %self.phase,
                to = %target,
                "Ignoring invalid disruption phase change"
            );
            return false;
        }
        self.phase = target;
        if target.is_terminal() {
            self.resolved_at = Some(Utc::now());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward() {
        use DisruptionPhase::*;
        assert!(Idle.can_transition_to(Triaging));
        assert!(Triaging.can_transition_to(Optimizing));
        assert!(Optimizing.can_transition_to(Resolved));
        assert!(!Idle.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Triaging));
        assert!(!Optimizing.can_transition_to(Triaging));
    }

    #[test]
    fn advance_stamps_resolution() {
        let mut record = DisruptionRecord::new(DisruptionEvent::new("Machine Breakdown", "CNC-02"));
        assert!(!record.advance(DisruptionPhase::Resolved));
        assert_eq!(record.phase, DisruptionPhase::Idle);

        assert!(record.advance(DisruptionPhase::Triaging));
        assert!(record.advance(DisruptionPhase::Optimizing));
        assert!(record.resolved_at.is_none());
        assert!(record.advance(DisruptionPhase::Resolved));
        assert!(record.resolved_at.is_some());
    }

    #[test]
    fn event_deserializes_without_timestamp() {
        let event: DisruptionEvent =
            serde_json::from_str(r#"{"type": "Worker Absence", "resource": "Ana"}"#).unwrap();
        assert_eq!(event.kind, "Worker Absence");
        assert_eq!(event.resource, "Ana");
    }
}
