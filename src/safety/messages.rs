/// Message and detail templates for findings.
///
/// Messages are short and stable: the interaction matcher deduplicates on
/// them and the audit trail stores them verbatim.
pub struct MessageTemplates;

impl MessageTemplates {
    pub fn allergy_direct(allergen: &str) -> String {
        format!("ALLERGY ALERT: Patient is allergic to \"{allergen}\"")
    }

    pub fn allergy_direct_details(
        drug_display: &str,
        allergen: &str,
        reaction: Option<&str>,
        severity: Option<&str>,
    ) -> String {
        format!(
            "{drug_display} conflicts with documented allergy to \"{allergen}\".{}{} DO NOT PRESCRIBE.",
            reaction_clause(reaction),
            severity_clause(severity),
        )
    }

    pub fn cross_reactivity(allergen: &str, drug: &str) -> String {
        format!("CROSS-REACTIVITY: Patient allergic to \"{allergen}\" - {drug} may cause reaction")
    }

    pub fn cross_reactivity_details(
        drug: &str,
        allergen: &str,
        drug_class: &str,
        reaction: Option<&str>,
    ) -> String {
        format!(
            "{drug} belongs to a drug class ({drug_class}) with known cross-reactivity to \"{allergen}\".{} \
             Consider alternative medication.",
            reaction_clause(reaction),
        )
    }

    pub fn interaction(message: &str) -> String {
        format!("DRUG INTERACTION: {message}")
    }

    pub fn interaction_details(
        drug: &str,
        interacting_with: Option<&str>,
        message: &str,
        management: &str,
    ) -> String {
        let other = interacting_with.unwrap_or("another prescribed medication");
        if management.is_empty() {
            format!("{drug} interacts with {other}. {message}")
        } else {
            format!("{drug} interacts with {other}. {message} Management: {management}")
        }
    }

    pub fn duplicate(drug: &str) -> String {
        format!("DUPLICATE THERAPY: {drug} is already prescribed")
    }

    pub fn duplicate_details(drug: &str) -> String {
        format!(
            "Patient already has an active prescription for {drug}. \
             Verify this is intentional and not a duplicate order."
        )
    }

    pub fn pediatric(drug: &str, age_years: u32) -> String {
        format!("PEDIATRIC CAUTION: {drug} - patient is {age_years} years old")
    }

    pub fn pediatric_details(drug: &str, age_limit: u32) -> String {
        format!(
            "{drug} requires careful dosing or may be contraindicated in children under {age_limit}. \
             Verify age-appropriate dosing."
        )
    }
}

fn reaction_clause(reaction: Option<&str>) -> String {
    match reaction.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => format!(" Known reaction: {r}."),
        None => String::new(),
    }
}

fn severity_clause(severity: Option<&str>) -> String {
    match severity.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => format!(" Severity: {s}."),
        None => String::new(),
    }
}
