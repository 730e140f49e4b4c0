use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::enums::{RuleOrigin, Severity};
use crate::models::{normalize_keywords, DrugClassRule, InteractionRule};

use super::types::SafetyError;

pub const BUILTIN_VERSION: &str = "builtin-2026.1";

/// Age (in whole years) below which pediatric cautions apply.
pub const PEDIATRIC_AGE_LIMIT: u32 = 12;

const CROSS_REACTIVITY_FILE: &str = "cross_reactivity.json";
const INTERACTIONS_FILE: &str = "interactions.json";
const PEDIATRIC_FILE: &str = "pediatric.json";

/// Pediatric caution list as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PediatricCaution {
    pub age_limit_years: u32,
    pub keywords: Vec<String>,
}

/// Static clinical tables. Built once at startup and shared read-only
/// into every evaluation.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    pub version: String,
    pub cross_reactivity: Vec<DrugClassRule>,
    pub interactions: Vec<InteractionRule>,
    pub pediatric: PediatricCaution,
}

impl KnowledgeBase {
    /// Load replacement tables from `cross_reactivity.json`, `interactions.json`
    /// and `pediatric.json` in `dir`. The directory name is used as the version.
    pub fn load(dir: &Path) -> Result<Self, SafetyError> {
        let cross_reactivity: Vec<DrugClassRule> = read_json(dir, CROSS_REACTIVITY_FILE)?;
        let interactions: Vec<InteractionRule> = read_json(dir, INTERACTIONS_FILE)?;
        let pediatric: PediatricCaution = read_json(dir, PEDIATRIC_FILE)?;

        let version = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".into());

        let kb = Self::from_parts(version, cross_reactivity, interactions, pediatric);
        tracing::info!(
            version = %kb.version,
            classes = kb.cross_reactivity.len(),
            interactions = kb.interactions.len(),
            "Knowledge base loaded"
        );
        Ok(kb)
    }

    /// Normalizes every keyword and forces builtin origin on the interaction list.
    pub fn from_parts(
        version: String,
        cross_reactivity: Vec<DrugClassRule>,
        interactions: Vec<InteractionRule>,
        pediatric: PediatricCaution,
    ) -> Self {
        Self {
            version,
            cross_reactivity: cross_reactivity
                .iter()
                .map(DrugClassRule::normalized)
                .filter(|r| !r.allergen_keyword.is_empty())
                .collect(),
            interactions: interactions
                .iter()
                .map(|r| InteractionRule {
                    origin: RuleOrigin::Builtin,
                    active: true,
                    ..r.normalized()
                })
                .collect(),
            pediatric: PediatricCaution {
                age_limit_years: pediatric.age_limit_years,
                keywords: normalize_keywords(&pediatric.keywords),
            },
        }
    }

    /// The tables shipped with the platform.
    pub fn builtin() -> Self {
        let cross_reactivity = CROSS_REACTIVITY
            .iter()
            .map(|(allergen, drugs)| DrugClassRule {
                allergen_keyword: (*allergen).to_string(),
                conflicting_drug_keywords: drugs.iter().map(|d| d.to_string()).collect(),
            })
            .collect();

        let interactions = INTERACTIONS
            .iter()
            .enumerate()
            .map(|(i, (a, b, severity, message, management))| InteractionRule {
                id: format!("builtin-{}", i + 1),
                group_a: a.iter().map(|s| s.to_string()).collect(),
                group_b: b.iter().map(|s| s.to_string()).collect(),
                severity: *severity,
                message: (*message).to_string(),
                management: (*management).to_string(),
                origin: RuleOrigin::Builtin,
                active: true,
            })
            .collect();

        let pediatric = PediatricCaution {
            age_limit_years: PEDIATRIC_AGE_LIMIT,
            keywords: PEDIATRIC_CAUTION.iter().map(|s| s.to_string()).collect(),
        };

        Self::from_parts(
            BUILTIN_VERSION.to_string(),
            cross_reactivity,
            interactions,
            pediatric,
        )
    }

    /// Cross-reactivity classes whose key appears in the (lowercase) allergen.
    pub fn classes_for_allergen<'a>(
        &'a self,
        allergen_lower: &'a str,
    ) -> impl Iterator<Item = &'a DrugClassRule> + 'a {
        self.cross_reactivity
            .iter()
            .filter(move |c| allergen_lower.contains(c.allergen_keyword.as_str()))
    }
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T, SafetyError> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| SafetyError::ReferenceDataLoad(path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&raw)
        .map_err(|e| SafetyError::ReferenceDataParse(file.to_string(), e.to_string()))
}

// ---------------------------------------------------------------------------
// Builtin tables
// ---------------------------------------------------------------------------

const CROSS_REACTIVITY: &[(&str, &[&str])] = &[
    (
        "penicillin",
        &["amoxicillin", "amoxicillin-clavulanate", "ampicillin", "piperacillin", "flucloxacillin"],
    ),
    ("sulfa", &["sulfamethoxazole", "cotrimoxazole", "silver sulfadiazine", "sulfasalazine"]),
    (
        "sulfonamide",
        &["sulfamethoxazole", "cotrimoxazole", "silver sulfadiazine", "sulfasalazine"],
    ),
    ("nsaid", &["ibuprofen", "diclofenac", "aspirin", "naproxen", "piroxicam", "indomethacin"]),
    ("aspirin", &["aspirin", "ibuprofen", "diclofenac", "naproxen"]),
    ("cephalosporin", &["ceftriaxone", "cefuroxime", "cephalexin", "cefixime"]),
    ("quinolone", &["ciprofloxacin", "levofloxacin", "moxifloxacin"]),
    ("fluoroquinolone", &["ciprofloxacin", "levofloxacin", "moxifloxacin"]),
    ("macrolide", &["azithromycin", "erythromycin", "clarithromycin"]),
    ("tetracycline", &["doxycycline", "tetracycline"]),
    ("morphine", &["morphine", "codeine", "tramadol"]),
    ("opioid", &["morphine", "codeine", "tramadol", "pethidine"]),
    ("codeine", &["codeine", "tramadol"]),
    ("ace inhibitor", &["lisinopril", "enalapril", "ramipril", "captopril"]),
    ("statin", &["atorvastatin", "simvastatin", "rosuvastatin", "pravastatin"]),
    ("metformin", &["metformin"]),
    ("insulin", &["insulin regular", "insulin nph", "insulin glargine"]),
    ("iodine", &["povidone-iodine", "amiodarone"]),
    ("latex", &[]),
    ("egg", &[]),
];

type BuiltinInteraction = (
    &'static [&'static str],
    &'static [&'static str],
    Severity,
    &'static str,
    &'static str,
);

const INTERACTIONS: &[BuiltinInteraction] = &[
    (
        &["warfarin"],
        &["aspirin", "ibuprofen", "diclofenac", "naproxen"],
        Severity::Warning,
        "Increased bleeding risk. Monitor INR closely.",
        "Prefer paracetamol for analgesia; check INR within 3-5 days.",
    ),
    (
        &["warfarin"],
        &["metronidazole"],
        Severity::Critical,
        "Metronidazole markedly increases warfarin effect. Major bleeding risk.",
        "Avoid the combination or reduce warfarin dose with daily INR monitoring.",
    ),
    (
        &["warfarin"],
        &["erythromycin", "azithromycin", "ciprofloxacin"],
        Severity::Warning,
        "Antibiotic may increase warfarin effect. Monitor INR.",
        "Recheck INR within 3 days of starting the antibiotic.",
    ),
    (
        &["metformin"],
        &["contrast dye"],
        Severity::Warning,
        "Hold metformin 48h before/after contrast.",
        "Withhold metformin and confirm renal function before restarting.",
    ),
    (
        &["digoxin"],
        &["furosemide", "hydrochlorothiazide"],
        Severity::Warning,
        "Diuretic-induced hypokalemia increases digoxin toxicity risk. Monitor K+.",
        "Monitor serum potassium and digoxin levels.",
    ),
    (
        &["digoxin"],
        &["amiodarone"],
        Severity::Warning,
        "Amiodarone increases digoxin levels. Reduce digoxin dose by 50%.",
        "Halve the digoxin dose and monitor levels.",
    ),
    (
        &["lisinopril", "enalapril", "ramipril"],
        &["losartan", "valsartan"],
        Severity::Warning,
        "ACE inhibitor + ARB: increased risk of hyperkalemia and renal impairment.",
        "Avoid dual RAAS blockade; monitor potassium and creatinine.",
    ),
    (
        &["lisinopril", "enalapril", "ramipril"],
        &["potassium"],
        Severity::Warning,
        "ACE inhibitor + potassium: risk of hyperkalemia. Monitor K+.",
        "Monitor serum potassium.",
    ),
    (
        &["simvastatin", "atorvastatin"],
        &["erythromycin", "clarithromycin"],
        Severity::Warning,
        "Macrolide increases statin levels. Risk of rhabdomyolysis.",
        "Suspend the statin for the antibiotic course or use azithromycin.",
    ),
    (
        &["methotrexate"],
        &["nsaid", "ibuprofen", "diclofenac"],
        Severity::Critical,
        "NSAIDs reduce methotrexate clearance. Potentially fatal toxicity.",
        "Avoid NSAIDs; use paracetamol for analgesia.",
    ),
    (
        &["carbamazepine"],
        &["erythromycin"],
        Severity::Warning,
        "Erythromycin increases carbamazepine levels. Risk of toxicity.",
        "Choose a non-macrolide antibiotic or monitor carbamazepine levels.",
    ),
    (
        &["phenytoin"],
        &["metronidazole", "fluconazole"],
        Severity::Warning,
        "May increase phenytoin levels. Monitor levels.",
        "Monitor phenytoin levels and watch for ataxia.",
    ),
    (
        &["tramadol"],
        &["fluoxetine", "amitriptyline"],
        Severity::Warning,
        "Serotonin syndrome risk. Use with caution.",
        "Use the lowest effective dose and counsel on serotonergic symptoms.",
    ),
    (
        &["amlodipine", "nifedipine"],
        &["atenolol"],
        Severity::Info,
        "Calcium channel blocker + beta blocker: monitor for excessive bradycardia/hypotension.",
        "Monitor heart rate and blood pressure.",
    ),
    (
        &["insulin regular", "insulin nph"],
        &["glibenclamide", "metformin"],
        Severity::Info,
        "Multiple hypoglycemics: increased hypoglycemia risk. Monitor blood glucose.",
        "Monitor blood glucose.",
    ),
    (
        &["ciprofloxacin"],
        &["antacid", "omeprazole", "ranitidine"],
        Severity::Info,
        "Antacids may reduce ciprofloxacin absorption. Space doses 2h apart.",
        "Give ciprofloxacin 2 hours before the antacid.",
    ),
];

const PEDIATRIC_CAUTION: &[&str] = &[
    "aspirin",
    "doxycycline",
    "ciprofloxacin",
    "levofloxacin",
    "tetracycline",
    "metformin",
    "atorvastatin",
    "simvastatin",
    "losartan",
    "lisinopril",
    "warfarin",
];
