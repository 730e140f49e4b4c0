//! Outbound contracts. The engine only reads through these; implementations
//! live with whoever owns the data (see `db::SqliteStore` for the bundled one).

use uuid::Uuid;

use crate::models::{CandidateDrug, InteractionRule, PatientSafetyProfile};

use super::types::{AuditedFinding, DateRange, OverrideCounts, SafetyError};

/// Allergies, active medications and date of birth for a patient.
pub trait PatientDataProvider: Send + Sync {
    /// Returns an empty-but-valid profile when the patient has nothing on file.
    /// Items of `exclude_prescription_id` are left out of the active medications.
    fn load_profile(
        &self,
        tenant_id: &str,
        patient_id: &str,
        exclude_prescription_id: Option<&str>,
    ) -> Result<PatientSafetyProfile, SafetyError>;
}

/// Resolves drug ids to generic names.
pub trait DrugDataProvider: Send + Sync {
    /// Unknown ids may be omitted from the result; the caller turns the gap
    /// into `UnknownDrug`.
    fn resolve_drugs(&self, drug_ids: &[String]) -> Result<Vec<CandidateDrug>, SafetyError>;
}

/// Tenant-authored interaction rules.
pub trait TenantRuleStore: Send + Sync {
    fn active_rules(&self, tenant_id: &str) -> Result<Vec<InteractionRule>, SafetyError>;
}

/// Append-only store of audited findings plus the override write.
pub trait AuditStore: Send + Sync {
    fn append(&self, records: &[AuditedFinding]) -> Result<(), SafetyError>;

    fn get(&self, id: &Uuid) -> Result<Option<AuditedFinding>, SafetyError>;

    /// Atomically set the override fields if not yet overridden.
    /// Fails with `AlreadyOverridden` or `AuditedFindingNotFound`.
    fn mark_overridden(
        &self,
        id: &Uuid,
        user_id: &str,
        reason: &str,
        at: chrono::NaiveDateTime,
    ) -> Result<(), SafetyError>;

    /// `mark_overridden` for several findings, all or none. The first id that
    /// cannot be overridden fails the call and no record changes.
    fn mark_overridden_all(
        &self,
        ids: &[Uuid],
        user_id: &str,
        reason: &str,
        at: chrono::NaiveDateTime,
    ) -> Result<(), SafetyError>;

    fn override_counts(
        &self,
        tenant_id: &str,
        range: Option<DateRange>,
    ) -> Result<OverrideCounts, SafetyError>;

    /// Audited findings for a patient, newest first.
    fn list_for_patient(
        &self,
        tenant_id: &str,
        patient_id: &str,
    ) -> Result<Vec<AuditedFinding>, SafetyError>;
}
