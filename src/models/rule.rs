use serde::{Deserialize, Serialize};

use super::enums::{RuleOrigin, Severity};

/// Allergen keyword and the drug keywords it cross-reacts with.
/// Keywords are lowercase substrings, not exact identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugClassRule {
    pub allergen_keyword: String,
    pub conflicting_drug_keywords: Vec<String>,
}

/// Pairwise drug interaction between two keyword groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRule {
    pub id: String,
    pub group_a: Vec<String>,
    pub group_b: Vec<String>,
    pub severity: Severity,
    pub message: String,
    pub management: String,
    #[serde(default = "default_origin")]
    pub origin: RuleOrigin,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_origin() -> RuleOrigin {
    RuleOrigin::Builtin
}

fn default_active() -> bool {
    true
}

/// Lowercase and trim every keyword, dropping blanks.
/// An empty keyword would substring-match every drug name.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

impl DrugClassRule {
    pub fn normalized(&self) -> Self {
        Self {
            allergen_keyword: self.allergen_keyword.trim().to_lowercase(),
            conflicting_drug_keywords: normalize_keywords(&self.conflicting_drug_keywords),
        }
    }
}

impl InteractionRule {
    pub fn normalized(&self) -> Self {
        Self {
            group_a: normalize_keywords(&self.group_a),
            group_b: normalize_keywords(&self.group_b),
            ..self.clone()
        }
    }
}
