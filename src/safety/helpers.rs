/// Case-insensitive containment in either direction.
///
/// Both inputs must already be lowercase. Blank inputs never match, since
/// the empty string is contained in everything.
pub fn contains_either_way(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// First keyword that is a substring of `name` (lowercase inputs).
pub fn first_matching_keyword<'k>(name: &str, keywords: &'k [String]) -> Option<&'k str> {
    keywords
        .iter()
        .find(|k| !k.is_empty() && name.contains(k.as_str()))
        .map(|k| k.as_str())
}

pub fn matches_any(name: &str, keywords: &[String]) -> bool {
    first_matching_keyword(name, keywords).is_some()
}

/// Format `part / whole` as a percentage string. Zero denominators give "0%".
pub fn format_rate(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0%".to_string();
    }
    let pct = (part as f64 / whole as f64) * 100.0;
    let rounded = (pct * 10.0).round() / 10.0;
    format!("{rounded}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_works_both_directions() {
        assert!(contains_either_way("amoxicillin", "amoxicillin-clavulanate"));
        assert!(contains_either_way("amoxicillin-clavulanate", "amoxicillin"));
        assert!(!contains_either_way("penicillin", "amoxicillin"));
    }

    #[test]
    fn blank_never_matches() {
        assert!(!contains_either_way("", "aspirin"));
        assert!(!contains_either_way("aspirin", ""));
    }

    #[test]
    fn first_matching_keyword_respects_order() {
        let keywords = vec!["insulin regular".to_string(), "insulin".to_string()];
        assert_eq!(
            first_matching_keyword("insulin regular 100iu", &keywords),
            Some("insulin regular")
        );
        assert_eq!(first_matching_keyword("insulin glargine", &keywords), Some("insulin"));
        assert_eq!(first_matching_keyword("metformin", &keywords), None);
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(format_rate(0, 0), "0%");
        assert_eq!(format_rate(1, 2), "50%");
        assert_eq!(format_rate(1, 3), "33.3%");
        assert_eq!(format_rate(2, 3), "66.7%");
        assert_eq!(format_rate(3, 3), "100%");
    }
}
