//! Medication safety: allergy, interaction, duplicate-therapy and pediatric
//! checks, the audit trail they feed, and the two workflow integration points.

pub mod audit;
pub mod detection;
pub mod engine;
pub mod gate;
pub mod helpers;
pub mod knowledge;
pub mod merger;
pub mod messages;
pub mod providers;
pub mod service;
pub mod store;
pub mod types;

pub use audit::AuditTrail;
pub use engine::{EvaluationInput, SafetyEngine};
pub use gate::{decide, BlockReason, DispenseDecision};
pub use knowledge::KnowledgeBase;
pub use merger::{merge_rules, MergedRuleSet};
pub use providers::{AuditStore, DrugDataProvider, PatientDataProvider, TenantRuleStore};
pub use service::{EvaluationRequest, SafetyService};
pub use store::MemoryAuditStore;
pub use types::*;
