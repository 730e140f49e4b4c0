use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::allergy::Allergy;

/// Read-only snapshot of everything the engine needs to know about a patient.
///
/// Assembled by a `PatientDataProvider`; the engine never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSafetyProfile {
    pub patient_id: String,
    pub allergies: Vec<Allergy>,
    /// Generic names of drugs on the patient's other active prescriptions.
    pub active_drug_names: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl PatientSafetyProfile {
    /// A valid profile for a patient with nothing on file.
    pub fn empty(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ..Self::default()
        }
    }

    /// Whole years between date of birth and `as_of`, if the birth date is known.
    /// A birth date after `as_of` counts as age 0.
    pub fn age_in_years(&self, as_of: NaiveDate) -> Option<u32> {
        self.date_of_birth
            .map(|dob| as_of.years_since(dob).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_whole_years() {
        let mut profile = PatientSafetyProfile::empty("p1");
        profile.date_of_birth = Some(date(2014, 6, 15));
        assert_eq!(profile.age_in_years(date(2026, 6, 14)), Some(11));
        assert_eq!(profile.age_in_years(date(2026, 6, 15)), Some(12));
    }

    #[test]
    fn age_unknown_without_birth_date() {
        let profile = PatientSafetyProfile::empty("p1");
        assert_eq!(profile.age_in_years(date(2026, 1, 1)), None);
    }

    #[test]
    fn future_birth_date_is_age_zero() {
        let mut profile = PatientSafetyProfile::empty("p1");
        profile.date_of_birth = Some(date(2030, 1, 1));
        assert_eq!(profile.age_in_years(date(2026, 1, 1)), Some(0));
    }
}
