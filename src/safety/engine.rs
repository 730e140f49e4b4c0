use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;

use crate::models::enums::Severity;
use crate::models::{CandidateDrug, PatientSafetyProfile};

use super::detection::{match_allergies, match_duplicates, match_interactions, match_pediatric};
use super::knowledge::KnowledgeBase;
use super::merger::MergedRuleSet;
use super::types::{SafetyFinding, SafetyReport};

/// Everything one evaluation reads. The evaluation date is an input so the
/// engine stays a pure function of its arguments.
pub struct EvaluationInput<'a> {
    pub profile: &'a PatientSafetyProfile,
    pub candidates: &'a [CandidateDrug],
    pub rules: &'a MergedRuleSet,
    pub as_of: NaiveDate,
}

/// Runs the four rule families and aggregates their findings.
/// Holds no mutable state; safe to share across threads.
#[derive(Clone)]
pub struct SafetyEngine {
    knowledge: Arc<KnowledgeBase>,
}

impl SafetyEngine {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// All four families run unconditionally; a CRITICAL finding in one does
    /// not stop the others.
    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> SafetyReport {
        let start = Instant::now();

        let allergies = match_allergies(input.profile, input.candidates, &self.knowledge);
        let interactions = match_interactions(
            input.candidates,
            &input.profile.active_drug_names,
            input.rules,
        );
        let duplicates = match_duplicates(input.candidates, &input.profile.active_drug_names);
        let pediatric =
            match_pediatric(input.profile, input.candidates, &self.knowledge, input.as_of);

        let (allergy_n, interaction_n, duplicate_n, pediatric_n) = (
            allergies.len(),
            interactions.len(),
            duplicates.len(),
            pediatric.len(),
        );

        let findings: Vec<SafetyFinding> = allergies
            .into_iter()
            .chain(interactions)
            .chain(duplicates)
            .chain(pediatric)
            .collect();

        let report = aggregate(findings);

        tracing::info!(
            patient_id = %input.profile.patient_id,
            candidates = input.candidates.len(),
            rules = input.rules.len(),
            allergies = allergy_n,
            interactions = interaction_n,
            duplicates = duplicate_n,
            pediatric = pediatric_n,
            safe = report.safe,
            processing_us = start.elapsed().as_micros() as u64,
            "Safety evaluation complete"
        );

        report
    }
}

/// Count findings by severity. `safe` iff there are no CRITICAL findings.
pub fn aggregate(findings: Vec<SafetyFinding>) -> SafetyReport {
    let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
    let critical_count = count(Severity::Critical);
    let warning_count = count(Severity::Warning);
    let info_count = count(Severity::Info);

    SafetyReport {
        safe: critical_count == 0,
        findings,
        critical_count,
        warning_count,
        info_count,
    }
}
