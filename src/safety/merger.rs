use serde::{Deserialize, Serialize};

use crate::models::enums::RuleOrigin;
use crate::models::InteractionRule;

use super::knowledge::KnowledgeBase;
use super::providers::TenantRuleStore;
use super::types::SafetyError;

/// Builtin plus tenant interaction rules for one evaluation.
/// Builtin rules come first; duplicate-message suppression relies on that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRuleSet {
    rules: Vec<InteractionRule>,
}

impl MergedRuleSet {
    /// Normalizes the given rules, keeping their order and dropping inactive ones.
    pub fn from_rules(rules: Vec<InteractionRule>) -> Self {
        Self {
            rules: rules
                .iter()
                .filter(|r| r.active)
                .map(InteractionRule::normalized)
                .collect(),
        }
    }

    pub fn from_builtin(knowledge: &KnowledgeBase) -> Self {
        Self::from_rules(knowledge.interactions.clone())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InteractionRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn tenant_rule_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| r.origin == RuleOrigin::Tenant)
            .count()
    }
}

/// Union of the static interaction list and the tenant's active rules.
///
/// A failed fetch aborts with `RuleSourceUnavailable`: evaluating with only the
/// builtin rules would silently drop tenant contraindications.
pub fn merge_rules(
    knowledge: &KnowledgeBase,
    tenant_id: &str,
    store: &dyn TenantRuleStore,
) -> Result<MergedRuleSet, SafetyError> {
    let tenant_rules = store.active_rules(tenant_id).map_err(|e| {
        tracing::error!(tenant_id, error = %e, "Tenant rule fetch failed");
        match e {
            SafetyError::RuleSourceUnavailable(msg) => SafetyError::RuleSourceUnavailable(msg),
            other => SafetyError::RuleSourceUnavailable(other.to_string()),
        }
    })?;

    let rules = knowledge
        .interactions
        .iter()
        .cloned()
        .chain(tenant_rules.into_iter().map(|r| InteractionRule {
            origin: RuleOrigin::Tenant,
            ..r
        }))
        .collect();

    let merged = MergedRuleSet::from_rules(rules);
    tracing::debug!(
        tenant_id,
        total = merged.len(),
        tenant = merged.tenant_rule_count(),
        "Interaction rules merged"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Severity;

    struct FixedRules(Vec<InteractionRule>);

    impl TenantRuleStore for FixedRules {
        fn active_rules(&self, _tenant_id: &str) -> Result<Vec<InteractionRule>, SafetyError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenRules;

    impl TenantRuleStore for BrokenRules {
        fn active_rules(&self, _tenant_id: &str) -> Result<Vec<InteractionRule>, SafetyError> {
            Err(SafetyError::LockFailed)
        }
    }

    fn tenant_rule(id: &str, active: bool) -> InteractionRule {
        InteractionRule {
            id: id.into(),
            group_a: vec!["Clopidogrel".into()],
            group_b: vec![" OMEPRAZOLE".into()],
            severity: Severity::Warning,
            message: "Omeprazole reduces clopidogrel activation.".into(),
            management: "Prefer pantoprazole.".into(),
            origin: RuleOrigin::Builtin,
            active,
        }
    }

    #[test]
    fn builtin_rules_precede_tenant_rules() {
        let kb = KnowledgeBase::builtin();
        let merged = merge_rules(&kb, "t1", &FixedRules(vec![tenant_rule("t-1", true)])).unwrap();

        assert_eq!(merged.len(), kb.interactions.len() + 1);
        assert_eq!(merged.tenant_rule_count(), 1);
        let last = merged.iter().last().unwrap();
        assert_eq!(last.id, "t-1");
        assert_eq!(last.origin, RuleOrigin::Tenant);
        assert!(merged
            .iter()
            .take(kb.interactions.len())
            .all(|r| r.origin == RuleOrigin::Builtin));
    }

    #[test]
    fn tenant_keywords_are_normalized() {
        let kb = KnowledgeBase::builtin();
        let merged = merge_rules(&kb, "t1", &FixedRules(vec![tenant_rule("t-1", true)])).unwrap();
        let last = merged.iter().last().unwrap();
        assert_eq!(last.group_a, vec!["clopidogrel".to_string()]);
        assert_eq!(last.group_b, vec!["omeprazole".to_string()]);
    }

    #[test]
    fn inactive_tenant_rules_excluded() {
        let kb = KnowledgeBase::builtin();
        let merged = merge_rules(&kb, "t1", &FixedRules(vec![tenant_rule("t-1", false)])).unwrap();
        assert_eq!(merged.tenant_rule_count(), 0);
        assert_eq!(merged.len(), kb.interactions.len());
    }

    #[test]
    fn empty_tenant_rule_list_is_valid() {
        let kb = KnowledgeBase::builtin();
        let merged = merge_rules(&kb, "t1", &FixedRules(vec![])).unwrap();
        assert_eq!(merged.len(), kb.interactions.len());
    }

    #[test]
    fn fetch_failure_aborts_merge() {
        let kb = KnowledgeBase::builtin();
        match merge_rules(&kb, "t1", &BrokenRules) {
            Err(SafetyError::RuleSourceUnavailable(_)) => {}
            other => panic!("Expected RuleSourceUnavailable, got: {other:?}"),
        }
    }
}
