use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Severity {
    Critical => "CRITICAL",
    Warning => "WARNING",
    Info => "INFO",
});

str_enum!(FindingType {
    Allergy => "ALLERGY",
    Interaction => "INTERACTION",
    Duplicate => "DUPLICATE",
    PediatricDose => "PEDIATRIC_DOSE",
});

str_enum!(EvaluationContext {
    Prescribing => "PRESCRIBING",
    Dispensing => "DISPENSING",
});

str_enum!(RuleOrigin {
    Builtin => "BUILTIN",
    Tenant => "TENANT",
});

str_enum!(GateOutcome {
    Allowed => "ALLOWED",
    Blocked => "BLOCKED",
});

str_enum!(PrescriptionStatus {
    Pending => "PENDING",
    Dispensed => "DISPENSED",
    Partial => "PARTIAL",
    Cancelled => "CANCELLED",
});

impl PrescriptionStatus {
    /// Statuses whose items count as the patient's current medications.
    pub const ACTIVE: [PrescriptionStatus; 3] = [Self::Pending, Self::Dispensed, Self::Partial];
}
