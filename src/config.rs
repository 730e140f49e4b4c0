use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "clinical-safety";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const ENV_DB_PATH: &str = "CLINICAL_SAFETY_DB";
const ENV_KNOWLEDGE_DIR: &str = "CLINICAL_SAFETY_KNOWLEDGE_DIR";
const ENV_DISPENSE_TIMEOUT_MS: &str = "CLINICAL_SAFETY_DISPENSE_TIMEOUT_MS";
const ENV_PRESCRIBE_TIMEOUT_MS: &str = "CLINICAL_SAFETY_PRESCRIBE_TIMEOUT_MS";

const DEFAULT_DISPENSE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PRESCRIBE_TIMEOUT_MS: u64 = 2_000;

/// Log filter used when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "clinical_safety=info,warn"
}

/// Get the application data directory.
/// Falls back to the working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("clinical_safety.db")
}

/// Runtime configuration for the safety service.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
    pub database_path: PathBuf,
    /// Directory with replacement knowledge tables; builtin tables when unset.
    pub knowledge_dir: Option<PathBuf>,
    /// Upper bound on a dispensing evaluation. Exceeding it blocks.
    pub dispense_timeout: Duration,
    /// Upper bound on a prescribing soft check. Exceeding it skips the check.
    pub prescribe_timeout: Duration,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            knowledge_dir: None,
            dispense_timeout: Duration::from_millis(DEFAULT_DISPENSE_TIMEOUT_MS),
            prescribe_timeout: Duration::from_millis(DEFAULT_PRESCRIBE_TIMEOUT_MS),
        }
    }
}

impl SafetyConfig {
    /// Defaults overridden by `CLINICAL_SAFETY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable timeouts keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|s| !s.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_KNOWLEDGE_DIR).filter(|s| !s.trim().is_empty()) {
            config.knowledge_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = parse_millis(&lookup, ENV_DISPENSE_TIMEOUT_MS) {
            config.dispense_timeout = ms;
        }
        if let Some(ms) = parse_millis(&lookup, ENV_PRESCRIBE_TIMEOUT_MS) {
            config.prescribe_timeout = ms;
        }

        config
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid timeout setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn database_under_app_data() {
        let path = default_database_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("clinical_safety.db"));
    }

    #[test]
    fn defaults_without_environment() {
        let config = SafetyConfig::from_lookup(lookup(&[]));
        assert_eq!(config, SafetyConfig::default());
        assert_eq!(config.dispense_timeout, Duration::from_millis(5_000));
        assert!(config.knowledge_dir.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = SafetyConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/his/safety.db"),
            (ENV_KNOWLEDGE_DIR, "/etc/his/knowledge"),
            (ENV_DISPENSE_TIMEOUT_MS, "750"),
            (ENV_PRESCRIBE_TIMEOUT_MS, " 300 "),
        ]));
        assert_eq!(config.database_path, PathBuf::from("/var/lib/his/safety.db"));
        assert_eq!(config.knowledge_dir, Some(PathBuf::from("/etc/his/knowledge")));
        assert_eq!(config.dispense_timeout, Duration::from_millis(750));
        assert_eq!(config.prescribe_timeout, Duration::from_millis(300));
    }

    #[test]
    fn invalid_timeouts_keep_defaults() {
        let config = SafetyConfig::from_lookup(lookup(&[
            (ENV_DISPENSE_TIMEOUT_MS, "soon"),
            (ENV_PRESCRIBE_TIMEOUT_MS, "0"),
        ]));
        assert_eq!(config.dispense_timeout, Duration::from_millis(5_000));
        assert_eq!(config.prescribe_timeout, Duration::from_millis(2_000));
    }

    #[test]
    fn app_name_is_stable() {
        assert_eq!(APP_NAME, "clinical-safety");
    }
}
