use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::enums::Severity;
use crate::models::{CandidateDrug, PatientSafetyProfile};

use super::helpers::{contains_either_way, first_matching_keyword, matches_any};
use super::knowledge::KnowledgeBase;
use super::merger::MergedRuleSet;
use super::messages::MessageTemplates;
use super::types::{
    AllergyDetail, AllergyMatch, DuplicateDetail, FindingDetail, InteractionDetail,
    PediatricDetail, SafetyFinding,
};

// ---------------------------------------------------------------------------
// [1] ALLERGY
// ---------------------------------------------------------------------------

/// Direct and cross-reactivity allergy matches. Always CRITICAL, never overridable.
///
/// Both checks run for every (allergy, drug) pair; a pair can yield one finding
/// of each kind. Iteration follows candidate order, then allergy order.
pub fn match_allergies(
    profile: &PatientSafetyProfile,
    candidates: &[CandidateDrug],
    knowledge: &KnowledgeBase,
) -> Vec<SafetyFinding> {
    let mut findings = Vec::new();

    if profile.allergies.is_empty() {
        return findings;
    }

    for drug in candidates {
        let drug_lower = drug.generic_name.trim().to_lowercase();
        if drug_lower.is_empty() {
            continue;
        }

        for allergy in &profile.allergies {
            let allergen_lower = allergy.allergen.trim().to_lowercase();
            if allergen_lower.is_empty() {
                continue;
            }

            let detail = |matched_by| AllergyDetail {
                allergen: allergy.allergen.clone(),
                reaction: allergy.reaction.clone(),
                allergy_severity: allergy.severity.clone(),
                matched_by,
            };

            if contains_either_way(&drug_lower, &allergen_lower) {
                findings.push(allergy_finding(
                    drug,
                    MessageTemplates::allergy_direct(&allergy.allergen),
                    MessageTemplates::allergy_direct_details(
                        &drug.display_name(),
                        &allergy.allergen,
                        allergy.reaction.as_deref(),
                        allergy.severity.as_deref(),
                    ),
                    detail(AllergyMatch::Direct),
                ));
            }

            let cross_class = knowledge
                .classes_for_allergen(&allergen_lower)
                .find(|class| matches_any(&drug_lower, &class.conflicting_drug_keywords));

            if let Some(class) = cross_class {
                findings.push(allergy_finding(
                    drug,
                    MessageTemplates::cross_reactivity(&allergy.allergen, &drug.generic_name),
                    MessageTemplates::cross_reactivity_details(
                        &drug.generic_name,
                        &allergy.allergen,
                        &class.allergen_keyword,
                        allergy.reaction.as_deref(),
                    ),
                    detail(AllergyMatch::CrossReactivity {
                        drug_class: class.allergen_keyword.clone(),
                    }),
                ));
            }
        }
    }

    findings
}

fn allergy_finding(
    drug: &CandidateDrug,
    message: String,
    details: String,
    detail: AllergyDetail,
) -> SafetyFinding {
    SafetyFinding {
        severity: Severity::Critical,
        drug_id: drug.id.clone(),
        drug_name: drug.generic_name.clone(),
        message,
        details,
        can_override: false,
        detail: FindingDetail::Allergy(detail),
    }
}

// ---------------------------------------------------------------------------
// [2] INTERACTION
// ---------------------------------------------------------------------------

/// Pairwise interaction rules evaluated against everything the patient is or
/// will be on: candidate names plus active medication names.
///
/// A firing rule is attributed to the first candidate matching either group.
/// Rules that only involve existing medications produce nothing. A given
/// (trigger drug, rule message) pair is emitted once; earlier rules win.
pub fn match_interactions(
    candidates: &[CandidateDrug],
    active_drug_names: &[String],
    rules: &MergedRuleSet,
) -> Vec<SafetyFinding> {
    let mut findings = Vec::new();
    let mut emitted: HashSet<(String, String)> = HashSet::new();

    let candidate_names: Vec<String> = candidates
        .iter()
        .map(|d| d.generic_name.trim().to_lowercase())
        .collect();
    let combined: Vec<String> = candidate_names
        .iter()
        .cloned()
        .chain(active_drug_names.iter().map(|n| n.trim().to_lowercase()))
        .filter(|n| !n.is_empty())
        .collect();

    for rule in rules.iter() {
        let has_a = combined.iter().any(|n| matches_any(n, &rule.group_a));
        let has_b = combined.iter().any(|n| matches_any(n, &rule.group_b));
        if !(has_a && has_b) {
            continue;
        }

        let trigger = candidates.iter().zip(&candidate_names).find(|(_, name)| {
            matches_any(name, &rule.group_a) || matches_any(name, &rule.group_b)
        });
        let Some((drug, trigger_name)) = trigger else {
            continue;
        };

        if !emitted.insert((drug.id.clone(), rule.message.clone())) {
            tracing::debug!(
                drug_id = %drug.id,
                rule_id = %rule.id,
                "Interaction message already raised for this drug, skipping"
            );
            continue;
        }

        let trigger_in_a = matches_any(trigger_name, &rule.group_a);
        let interacting_with = combined
            .iter()
            .find(|n| {
                if trigger_in_a {
                    matches_any(n, &rule.group_b)
                } else {
                    matches_any(n, &rule.group_a)
                }
            })
            .cloned();

        findings.push(SafetyFinding {
            severity: rule.severity,
            drug_id: drug.id.clone(),
            drug_name: drug.generic_name.clone(),
            message: MessageTemplates::interaction(&rule.message),
            details: MessageTemplates::interaction_details(
                &drug.generic_name,
                interacting_with.as_deref(),
                &rule.message,
                &rule.management,
            ),
            can_override: rule.severity != Severity::Critical,
            detail: FindingDetail::Interaction(InteractionDetail {
                rule_id: rule.id.clone(),
                rule_origin: rule.origin,
                interacting_with,
                management: rule.management.clone(),
            }),
        });
    }

    findings
}

// ---------------------------------------------------------------------------
// [3] DUPLICATE
// ---------------------------------------------------------------------------

/// Candidate whose generic name exactly equals an active medication name.
/// Exact match only; combination products must not trip this check.
pub fn match_duplicates(
    candidates: &[CandidateDrug],
    active_drug_names: &[String],
) -> Vec<SafetyFinding> {
    let active: HashSet<String> = active_drug_names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();

    candidates
        .iter()
        .filter_map(|drug| {
            let name = drug.generic_name.trim().to_lowercase();
            if !active.contains(&name) {
                return None;
            }
            Some(SafetyFinding {
                severity: Severity::Warning,
                drug_id: drug.id.clone(),
                drug_name: drug.generic_name.clone(),
                message: MessageTemplates::duplicate(&drug.generic_name),
                details: MessageTemplates::duplicate_details(&drug.generic_name),
                can_override: true,
                detail: FindingDetail::Duplicate(DuplicateDetail {
                    active_drug_name: name,
                }),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// [4] PEDIATRIC
// ---------------------------------------------------------------------------

/// Caution-list drugs for patients under the pediatric age limit.
/// Skipped entirely when no date of birth is recorded.
pub fn match_pediatric(
    profile: &PatientSafetyProfile,
    candidates: &[CandidateDrug],
    knowledge: &KnowledgeBase,
    as_of: NaiveDate,
) -> Vec<SafetyFinding> {
    let Some(age_years) = profile.age_in_years(as_of) else {
        return Vec::new();
    };
    let limit = knowledge.pediatric.age_limit_years;
    if age_years >= limit {
        return Vec::new();
    }

    candidates
        .iter()
        .filter_map(|drug| {
            let name = drug.generic_name.trim().to_lowercase();
            let keyword = first_matching_keyword(&name, &knowledge.pediatric.keywords)?;
            Some(SafetyFinding {
                severity: Severity::Warning,
                drug_id: drug.id.clone(),
                drug_name: drug.generic_name.clone(),
                message: MessageTemplates::pediatric(&drug.generic_name, age_years),
                details: MessageTemplates::pediatric_details(&drug.generic_name, limit),
                can_override: true,
                detail: FindingDetail::PediatricDose(PediatricDetail {
                    age_years,
                    caution_keyword: keyword.to_string(),
                }),
            })
        })
        .collect()
}
