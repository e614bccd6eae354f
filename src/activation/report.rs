use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state of a configuration unit during activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Discovered,
    Eligible,
    Activating,
    Activated,
    Skipped,
    Failed,
}

impl UnitState {
    /// Whether the unit has reached a terminal state.
    pub fn is_final(self) -> bool {
        matches!(self, UnitState::Activated | UnitState::Skipped | UnitState::Failed)
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitState::Discovered => "discovered",
            UnitState::Eligible => "eligible",
            UnitState::Activating => "activating",
            UnitState::Activated => "activated",
            UnitState::Skipped => "skipped",
            UnitState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Final state of one unit, with the reason for skips and failures.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub state: UnitState,
    pub reason: Option<String>,
}

/// Per-run activation report handed to the application assembler: every
/// unit's final state in processing order, distinguishable skips vs
/// failures, plus run identity and timing.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration: std::time::Duration,
    pub units: Vec<UnitReport>,
}

impl ActivationReport {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        duration: std::time::Duration,
        units: Vec<UnitReport>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            duration,
            units,
        }
    }

    /// Final state of a unit by name.
    pub fn state_of(&self, unit: &str) -> Option<UnitState> {
        self.units.iter().find(|r| r.unit == unit).map(|r| r.state)
    }

    /// Reason recorded for a unit, if any.
    pub fn reason_of(&self, unit: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|r| r.unit == unit)
            .and_then(|r| r.reason.as_deref())
    }

    /// Unit names in the order they were activated.
    pub fn activated(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|r| r.state == UnitState::Activated)
            .map(|r| r.unit.as_str())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|r| r.state == UnitState::Skipped)
            .map(|r| r.unit.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|r| r.state == UnitState::Failed)
            .map(|r| r.unit.as_str())
            .collect()
    }

    /// Serialize the report for logs or diagnostics endpoints.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
