use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{EvaluationContext, FindingType, RuleOrigin, Severity};

// ---------------------------------------------------------------------------
// SafetyFinding
// ---------------------------------------------------------------------------

/// A single safety concern raised by one rule family for one drug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyFinding {
    pub severity: Severity,
    pub drug_id: String,
    pub drug_name: String,
    pub message: String,
    pub details: String,
    pub can_override: bool,
    /// Serialized inline: `type` plus the variant fields.
    #[serde(flatten)]
    pub detail: FindingDetail,
}

impl SafetyFinding {
    pub fn finding_type(&self) -> FindingType {
        self.detail.finding_type()
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// ---------------------------------------------------------------------------
// FindingDetail variants
// ---------------------------------------------------------------------------

/// Structured evidence behind a finding, one variant per rule family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingDetail {
    Allergy(AllergyDetail),
    Interaction(InteractionDetail),
    Duplicate(DuplicateDetail),
    PediatricDose(PediatricDetail),
}

impl FindingDetail {
    pub fn finding_type(&self) -> FindingType {
        match self {
            Self::Allergy(_) => FindingType::Allergy,
            Self::Interaction(_) => FindingType::Interaction,
            Self::Duplicate(_) => FindingType::Duplicate,
            Self::PediatricDose(_) => FindingType::PediatricDose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergyDetail {
    pub allergen: String,
    pub reaction: Option<String>,
    pub allergy_severity: Option<String>,
    pub matched_by: AllergyMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllergyMatch {
    /// Allergen and drug name contain one another.
    Direct,
    /// Allergen names a drug class that cross-reacts with the drug.
    CrossReactivity { drug_class: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDetail {
    pub rule_id: String,
    pub rule_origin: RuleOrigin,
    pub interacting_with: Option<String>,
    pub management: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateDetail {
    pub active_drug_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PediatricDetail {
    pub age_years: u32,
    pub caution_keyword: String,
}

// ---------------------------------------------------------------------------
// SafetyReport
// ---------------------------------------------------------------------------

/// Aggregated findings of one evaluation. `safe` iff no CRITICAL finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub safe: bool,
    pub findings: Vec<SafetyFinding>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl SafetyReport {
    pub fn empty() -> Self {
        Self {
            safe: true,
            findings: Vec::new(),
            critical_count: 0,
            warning_count: 0,
            info_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// A finding as persisted by the audit trail, with its override state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedFinding {
    pub id: Uuid,
    pub tenant_id: String,
    pub patient_id: String,
    pub context: EvaluationContext,
    pub encounter_id: Option<String>,
    pub prescription_id: Option<String>,
    pub finding: SafetyFinding,
    pub created_at: NaiveDateTime,
    pub was_overridden: bool,
    pub overridden_by: Option<String>,
    pub override_reason: Option<String>,
    pub overridden_at: Option<NaiveDateTime>,
}

/// Where a batch of findings was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditScope<'a> {
    pub tenant_id: &'a str,
    pub patient_id: &'a str,
    pub context: EvaluationContext,
    pub encounter_id: Option<&'a str>,
    pub prescription_id: Option<&'a str>,
}

/// Clinician override supplied at the dispensing counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePayload {
    pub user_id: String,
    pub reason: String,
}

/// Inclusive date range for statistics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.from && day <= self.to
    }
}

/// Raw counters returned by an `AuditStore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideCounts {
    pub total: u64,
    pub overridden: u64,
    pub critical: u64,
    pub critical_overridden: u64,
}

/// Override-rate statistics for compliance reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStats {
    pub total_alerts: u64,
    pub overridden_alerts: u64,
    pub override_rate: String,
    pub critical_alerts: u64,
    pub critical_overrides: u64,
    pub critical_override_rate: String,
}

// ---------------------------------------------------------------------------
// SafetyError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Unknown drug id(s): {}", .0.join(", "))]
    UnknownDrug(Vec<String>),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Tenant rule source unavailable: {0}")]
    RuleSourceUnavailable(String),

    #[error("Patient data unavailable: {0}")]
    PatientDataUnavailable(String),

    #[error("Audited finding {0} was already overridden")]
    AlreadyOverridden(Uuid),

    #[error("Override reason must not be empty")]
    EmptyReason,

    #[error("Audited finding not found: {0}")]
    AuditedFindingNotFound(Uuid),

    #[error("Audit store unavailable: {0}")]
    AuditUnavailable(String),

    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Safety evaluation timed out after {0} ms")]
    Timeout(u64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Evaluation task failed: {0}")]
    TaskFailed(String),

    #[error("Internal lock failed")]
    LockFailed,
}

impl SafetyError {
    /// Stable code surfaced to callers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownDrug(_) => "UNKNOWN_DRUG",
            Self::PatientNotFound(_) => "PATIENT_NOT_FOUND",
            Self::RuleSourceUnavailable(_) => "RULE_SOURCE_UNAVAILABLE",
            Self::PatientDataUnavailable(_) => "PATIENT_DATA_UNAVAILABLE",
            Self::AlreadyOverridden(_) => "ALREADY_OVERRIDDEN",
            Self::EmptyReason => "EMPTY_REASON",
            Self::AuditedFindingNotFound(_) => "AUDITED_FINDING_NOT_FOUND",
            Self::AuditUnavailable(_) => "AUDIT_UNAVAILABLE",
            Self::ReferenceDataLoad(..) | Self::ReferenceDataParse(..) => "REFERENCE_DATA",
            Self::Timeout(_) => "EVALUATION_TIMEOUT",
            Self::Database(_) | Self::TaskFailed(_) | Self::LockFailed => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, detail: FindingDetail) -> SafetyFinding {
        SafetyFinding {
            severity,
            drug_id: "d1".into(),
            drug_name: "aspirin".into(),
            message: "m".into(),
            details: "d".into(),
            can_override: severity != Severity::Critical,
            detail,
        }
    }

    #[test]
    fn finding_type_follows_detail() {
        let f = finding(
            Severity::Warning,
            FindingDetail::Duplicate(DuplicateDetail {
                active_drug_name: "aspirin".into(),
            }),
        );
        assert_eq!(f.finding_type(), FindingType::Duplicate);
    }

    #[test]
    fn detail_serializes_with_type_tag() {
        let detail = FindingDetail::PediatricDose(PediatricDetail {
            age_years: 8,
            caution_keyword: "ciprofloxacin".into(),
        });
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "PEDIATRIC_DOSE");
        assert_eq!(json["age_years"], 8);

        let back: FindingDetail = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn finding_serializes_type_at_top_level() {
        let f = finding(
            Severity::Critical,
            FindingDetail::Allergy(AllergyDetail {
                allergen: "penicillin".into(),
                reaction: None,
                allergy_severity: Some("severe".into()),
                matched_by: AllergyMatch::CrossReactivity {
                    drug_class: "penicillin".into(),
                },
            }),
        );
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["type"], "ALLERGY");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["allergen"], "penicillin");
        assert_eq!(json["matched_by"]["kind"], "cross_reactivity");
        assert!(json.get("detail").is_none());

        let back: SafetyFinding = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        };
        let first = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let last = NaiveDate::from_ymd_opt(2026, 3, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(range.contains(first));
        assert!(range.contains(last));
        assert!(!range.contains(after));
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(SafetyError::UnknownDrug(vec!["x".into()]).code(), "UNKNOWN_DRUG");
        assert_eq!(SafetyError::EmptyReason.code(), "EMPTY_REASON");
        assert_eq!(
            SafetyError::AlreadyOverridden(Uuid::nil()).code(),
            "ALREADY_OVERRIDDEN"
        );
        assert_eq!(
            SafetyError::RuleSourceUnavailable("down".into()).code(),
            "RULE_SOURCE_UNAVAILABLE"
        );
    }

    #[test]
    fn unknown_drug_message_lists_ids() {
        let err = SafetyError::UnknownDrug(vec!["d9".into(), "d10".into()]);
        assert_eq!(err.to_string(), "Unknown drug id(s): d9, d10");
    }
}
