//! Dispensing gate: EVALUATED -> {BLOCKED, ALLOWED}.

use serde::{Deserialize, Serialize};

use crate::models::enums::GateOutcome;

use super::types::{OverridePayload, SafetyReport};

/// Why the gate blocked fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// Unsafe report and no override supplied.
    CriticalFindings { critical_count: usize },
    /// Evaluation failed; the gate fails safe.
    EvaluationFailed { code: String, message: String },
    /// Findings could not be written to the audit trail.
    AuditFailed { message: String },
    /// Override payload supplied but could not be recorded.
    OverrideRejected { code: String, message: String },
}

/// Gate result handed back to the dispensing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseDecision {
    pub outcome: GateOutcome,
    pub report: Option<SafetyReport>,
    pub block_reason: Option<BlockReason>,
}

impl DispenseDecision {
    pub fn allowed(report: SafetyReport) -> Self {
        Self {
            outcome: GateOutcome::Allowed,
            report: Some(report),
            block_reason: None,
        }
    }

    pub fn blocked(report: Option<SafetyReport>, reason: BlockReason) -> Self {
        Self {
            outcome: GateOutcome::Blocked,
            report,
            block_reason: Some(reason),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == GateOutcome::Allowed
    }
}

/// Pure transition. A safe report is always allowed; an unsafe one only with
/// an override payload. Recording the override is the caller's job and must
/// happen before fulfillment proceeds.
pub fn decide(report: &SafetyReport, payload: Option<&OverridePayload>) -> GateOutcome {
    if report.safe || payload.is_some() {
        GateOutcome::Allowed
    } else {
        GateOutcome::Blocked
    }
}
