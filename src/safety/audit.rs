use std::sync::Arc;

use uuid::Uuid;

use super::helpers::format_rate;
use super::providers::AuditStore;
use super::types::{
    AuditScope, AuditedFinding, DateRange, OverrideStats, SafetyError, SafetyFinding,
};

/// Compliance trail: every emitted finding, plus clinician overrides.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Persist one audited record per finding. No-op for an empty list.
    pub fn log_findings(
        &self,
        scope: &AuditScope<'_>,
        findings: &[SafetyFinding],
    ) -> Result<Vec<AuditedFinding>, SafetyError> {
        if findings.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Local::now().naive_local();
        let records: Vec<AuditedFinding> = findings
            .iter()
            .map(|finding| AuditedFinding {
                id: Uuid::new_v4(),
                tenant_id: scope.tenant_id.to_string(),
                patient_id: scope.patient_id.to_string(),
                context: scope.context,
                encounter_id: scope.encounter_id.map(str::to_string),
                prescription_id: scope.prescription_id.map(str::to_string),
                finding: finding.clone(),
                created_at: now,
                was_overridden: false,
                overridden_by: None,
                override_reason: None,
                overridden_at: None,
            })
            .collect();

        self.store.append(&records)?;

        tracing::info!(
            tenant_id = scope.tenant_id,
            patient_id = scope.patient_id,
            context = scope.context.as_str(),
            count = records.len(),
            "Safety findings logged"
        );
        Ok(records)
    }

    /// Record a clinician override. The reason is mandatory and an audited
    /// finding can be overridden only once.
    pub fn record_override(
        &self,
        audited_finding_id: &Uuid,
        user_id: &str,
        reason: &str,
    ) -> Result<(), SafetyError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SafetyError::EmptyReason);
        }

        self.store.mark_overridden(
            audited_finding_id,
            user_id,
            reason,
            chrono::Local::now().naive_local(),
        )?;

        tracing::warn!(
            audited_finding_id = %audited_finding_id,
            user_id,
            "Safety finding overridden"
        );
        Ok(())
    }

    /// Record one override covering several findings. Either every finding
    /// is marked or none is.
    pub fn record_overrides(
        &self,
        audited_finding_ids: &[Uuid],
        user_id: &str,
        reason: &str,
    ) -> Result<(), SafetyError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SafetyError::EmptyReason);
        }
        if audited_finding_ids.is_empty() {
            return Ok(());
        }

        self.store.mark_overridden_all(
            audited_finding_ids,
            user_id,
            reason,
            chrono::Local::now().naive_local(),
        )?;

        tracing::warn!(
            count = audited_finding_ids.len(),
            user_id,
            "Safety findings overridden"
        );
        Ok(())
    }

    pub fn get(&self, audited_finding_id: &Uuid) -> Result<Option<AuditedFinding>, SafetyError> {
        self.store.get(audited_finding_id)
    }

    pub fn override_stats(
        &self,
        tenant_id: &str,
        range: Option<DateRange>,
    ) -> Result<OverrideStats, SafetyError> {
        let counts = self.store.override_counts(tenant_id, range)?;
        Ok(OverrideStats {
            total_alerts: counts.total,
            overridden_alerts: counts.overridden,
            override_rate: format_rate(counts.overridden, counts.total),
            critical_alerts: counts.critical,
            critical_overrides: counts.critical_overridden,
            critical_override_rate: format_rate(counts.critical_overridden, counts.critical),
        })
    }

    /// A patient's audited findings, newest first.
    pub fn patient_history(
        &self,
        tenant_id: &str,
        patient_id: &str,
    ) -> Result<Vec<AuditedFinding>, SafetyError> {
        self.store.list_for_patient(tenant_id, patient_id)
    }
}
