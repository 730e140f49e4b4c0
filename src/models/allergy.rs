use serde::{Deserialize, Serialize};

/// A recorded allergy as held in the patient's chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    pub reaction: Option<String>,
    /// Free-text severity as entered by the clinician ("severe", "mild", ...).
    pub severity: Option<String>,
}

impl Allergy {
    pub fn new(allergen: impl Into<String>) -> Self {
        Self {
            allergen: allergen.into(),
            reaction: None,
            severity: None,
        }
    }
}
