use serde::{Deserialize, Serialize};

/// A drug on the order being authored or dispensed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDrug {
    pub id: String,
    pub generic_name: String,
    pub brand_name: Option<String>,
}

impl CandidateDrug {
    pub fn new(id: impl Into<String>, generic_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            generic_name: generic_name.into(),
            brand_name: None,
        }
    }

    /// "generic (brand)" when a brand is on file, the generic name otherwise.
    pub fn display_name(&self) -> String {
        match self.brand_name.as_deref().filter(|b| !b.trim().is_empty()) {
            Some(brand) => format!("{} ({})", self.generic_name, brand),
            None => self.generic_name.clone(),
        }
    }
}
