//! Integration points: the advisory prescribing check and the fail-safe
//! dispensing gate, both driving the same evaluation pipeline.
//!
//! I/O (profile, drug resolution, rule merge, audit) runs on the blocking pool;
//! the engine itself runs inline once the three reads have joined.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SafetyConfig;
use crate::db::SqliteStore;
use crate::models::enums::{EvaluationContext, GateOutcome};
use crate::models::CandidateDrug;

use super::audit::AuditTrail;
use super::engine::{EvaluationInput, SafetyEngine};
use super::gate::{decide, BlockReason, DispenseDecision};
use super::knowledge::KnowledgeBase;
use super::merger::merge_rules;
use super::providers::{DrugDataProvider, PatientDataProvider, TenantRuleStore};
use super::types::{
    AuditScope, AuditedFinding, DateRange, OverridePayload, OverrideStats, SafetyError,
    SafetyFinding, SafetyReport,
};

/// One evaluation request from a prescribing or dispensing workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub tenant_id: String,
    pub patient_id: String,
    pub candidate_drug_ids: Vec<String>,
    /// Set when dispensing an existing prescription; its own items are not
    /// treated as active medications.
    pub prescription_id: Option<String>,
}

pub struct SafetyService {
    engine: SafetyEngine,
    patients: Arc<dyn PatientDataProvider>,
    drugs: Arc<dyn DrugDataProvider>,
    rules: Arc<dyn TenantRuleStore>,
    audit: AuditTrail,
    config: SafetyConfig,
}

impl SafetyService {
    pub fn new(
        engine: SafetyEngine,
        patients: Arc<dyn PatientDataProvider>,
        drugs: Arc<dyn DrugDataProvider>,
        rules: Arc<dyn TenantRuleStore>,
        audit: AuditTrail,
        config: SafetyConfig,
    ) -> Self {
        Self {
            engine,
            patients,
            drugs,
            rules,
            audit,
            config,
        }
    }

    /// Wire the service over the bundled SQLite store: the database at
    /// `config.database_path` serves all four outbound contracts.
    pub fn open(config: SafetyConfig) -> Result<Self, SafetyError> {
        let knowledge = match &config.knowledge_dir {
            Some(dir) => KnowledgeBase::load(dir)?,
            None => KnowledgeBase::builtin(),
        };
        let store = Arc::new(SqliteStore::open(&config.database_path)?);

        tracing::info!(
            database = %config.database_path.display(),
            knowledge = %knowledge.version,
            "Safety service ready"
        );

        Ok(Self::new(
            SafetyEngine::new(Arc::new(knowledge)),
            store.clone(),
            store.clone(),
            store.clone(),
            AuditTrail::new(store),
            config,
        ))
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn engine(&self) -> &SafetyEngine {
        &self.engine
    }

    pub async fn override_stats(
        &self,
        tenant_id: &str,
        range: Option<DateRange>,
    ) -> Result<OverrideStats, SafetyError> {
        let audit = self.audit.clone();
        let tenant_id = tenant_id.to_string();
        joined(tokio::task::spawn_blocking(move || {
            audit.override_stats(&tenant_id, range)
        }))
        .await
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Full evaluation with no audit side effects. Profile load, drug
    /// resolution and rule merge run concurrently; any failure aborts.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<SafetyReport, SafetyError> {
        let drug_ids = unique_ids(&request.candidate_drug_ids);
        if drug_ids.is_empty() {
            return Ok(SafetyReport::empty());
        }

        let profile_task = {
            let patients = Arc::clone(&self.patients);
            let tenant_id = request.tenant_id.clone();
            let patient_id = request.patient_id.clone();
            let exclude = request.prescription_id.clone();
            tokio::task::spawn_blocking(move || {
                patients.load_profile(&tenant_id, &patient_id, exclude.as_deref())
            })
        };

        let drug_task = {
            let drugs = Arc::clone(&self.drugs);
            let ids = drug_ids.clone();
            tokio::task::spawn_blocking(move || drugs.resolve_drugs(&ids))
        };

        let rule_task = {
            let engine = self.engine.clone();
            let rules = Arc::clone(&self.rules);
            let tenant_id = request.tenant_id.clone();
            tokio::task::spawn_blocking(move || {
                merge_rules(engine.knowledge(), &tenant_id, rules.as_ref())
            })
        };

        let (profile, resolved, rules) =
            tokio::try_join!(joined(profile_task), joined(drug_task), joined(rule_task))?;

        let candidates = order_candidates(&drug_ids, resolved)?;

        Ok(self.engine.evaluate(&EvaluationInput {
            profile: &profile,
            candidates: &candidates,
            rules: &rules,
            as_of: chrono::Local::now().date_naive(),
        }))
    }

    // -----------------------------------------------------------------------
    // [1] Prescribing soft check
    // -----------------------------------------------------------------------

    /// Advisory check while an order is being authored. Never blocks: an
    /// evaluation failure or timeout is logged and yields `None`.
    pub async fn prescribing_check(
        &self,
        request: &EvaluationRequest,
        encounter_id: Option<&str>,
    ) -> Option<SafetyReport> {
        let report = match self
            .evaluate_within(request, self.config.prescribe_timeout)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %request.tenant_id,
                    patient_id = %request.patient_id,
                    code = e.code(),
                    error = %e,
                    "Prescribing safety check skipped"
                );
                return None;
            }
        };

        if let Err(e) = self
            .log_findings(request, EvaluationContext::Prescribing, encounter_id, &report.findings)
            .await
        {
            tracing::warn!(
                patient_id = %request.patient_id,
                error = %e,
                "Prescribing findings not audited"
            );
        }

        Some(report)
    }

    // -----------------------------------------------------------------------
    // [2] Dispensing hard gate
    // -----------------------------------------------------------------------

    /// Fail-safe gate before fulfillment. Findings are audited before the
    /// decision is returned; every failure path ends in BLOCKED.
    pub async fn dispensing_gate(
        &self,
        request: &EvaluationRequest,
        encounter_id: Option<&str>,
        payload: Option<&OverridePayload>,
    ) -> DispenseDecision {
        let report = match self
            .evaluate_within(request, self.config.dispense_timeout)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    tenant_id = %request.tenant_id,
                    patient_id = %request.patient_id,
                    code = e.code(),
                    error = %e,
                    "Dispensing evaluation failed, blocking"
                );
                return DispenseDecision::blocked(
                    None,
                    BlockReason::EvaluationFailed {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                );
            }
        };

        let audited = match self
            .log_findings(request, EvaluationContext::Dispensing, encounter_id, &report.findings)
            .await
        {
            Ok(audited) => audited,
            Err(e) => {
                tracing::error!(
                    patient_id = %request.patient_id,
                    error = %e,
                    "Dispensing findings not audited, blocking"
                );
                return DispenseDecision::blocked(
                    Some(report),
                    BlockReason::AuditFailed {
                        message: e.to_string(),
                    },
                );
            }
        };

        match decide(&report, payload) {
            GateOutcome::Blocked => {
                tracing::warn!(
                    patient_id = %request.patient_id,
                    critical = report.critical_count,
                    "Dispensing blocked by critical findings"
                );
                let critical_count = report.critical_count;
                DispenseDecision::blocked(
                    Some(report),
                    BlockReason::CriticalFindings { critical_count },
                )
            }
            GateOutcome::Allowed => {
                if let (false, Some(payload)) = (report.safe, payload) {
                    if let Err(e) = self.apply_override(&audited, payload).await {
                        tracing::warn!(
                            patient_id = %request.patient_id,
                            code = e.code(),
                            error = %e,
                            "Dispensing override rejected"
                        );
                        return DispenseDecision::blocked(
                            Some(report),
                            BlockReason::OverrideRejected {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
                DispenseDecision::allowed(report)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn evaluate_within(
        &self,
        request: &EvaluationRequest,
        limit: Duration,
    ) -> Result<SafetyReport, SafetyError> {
        tokio::time::timeout(limit, self.evaluate(request))
            .await
            .map_err(|_| SafetyError::Timeout(limit.as_millis() as u64))?
    }

    async fn log_findings(
        &self,
        request: &EvaluationRequest,
        context: EvaluationContext,
        encounter_id: Option<&str>,
        findings: &[SafetyFinding],
    ) -> Result<Vec<AuditedFinding>, SafetyError> {
        if findings.is_empty() {
            return Ok(Vec::new());
        }

        let audit = self.audit.clone();
        let request = request.clone();
        let encounter_id = encounter_id.map(str::to_string);
        let findings = findings.to_vec();

        joined(tokio::task::spawn_blocking(move || {
            let scope = AuditScope {
                tenant_id: &request.tenant_id,
                patient_id: &request.patient_id,
                context,
                encounter_id: encounter_id.as_deref(),
                prescription_id: request.prescription_id.as_deref(),
            };
            audit.log_findings(&scope, &findings)
        }))
        .await
        .map_err(|e| match e {
            SafetyError::AuditUnavailable(_) => e,
            other => SafetyError::AuditUnavailable(other.to_string()),
        })
    }

    /// Record the override against every CRITICAL audited finding as one
    /// batch. A blank reason is rejected before anything is written.
    async fn apply_override(
        &self,
        audited: &[AuditedFinding],
        payload: &OverridePayload,
    ) -> Result<(), SafetyError> {
        if payload.reason.trim().is_empty() {
            return Err(SafetyError::EmptyReason);
        }

        let ids: Vec<Uuid> = audited
            .iter()
            .filter(|record| record.finding.is_critical())
            .map(|record| record.id)
            .collect();

        let audit = self.audit.clone();
        let payload = payload.clone();
        joined(tokio::task::spawn_blocking(move || {
            audit.record_overrides(&ids, &payload.user_id, &payload.reason)
        }))
        .await
    }
}

async fn joined<T>(handle: JoinHandle<Result<T, SafetyError>>) -> Result<T, SafetyError> {
    handle
        .await
        .map_err(|e| SafetyError::TaskFailed(e.to_string()))?
}

/// Request ids in order, first occurrence wins.
fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Reorder resolved drugs to match the request; any id the provider did not
/// return fails the evaluation.
fn order_candidates(
    requested: &[String],
    resolved: Vec<CandidateDrug>,
) -> Result<Vec<CandidateDrug>, SafetyError> {
    let mut by_id: HashMap<String, CandidateDrug> =
        resolved.into_iter().map(|d| (d.id.clone(), d)).collect();

    let mut candidates = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();
    for id in requested {
        match by_id.remove(id) {
            Some(drug) => candidates.push(drug),
            None => unknown.push(id.clone()),
        }
    }

    if unknown.is_empty() {
        Ok(candidates)
    } else {
        Err(SafetyError::UnknownDrug(unknown))
    }
}
