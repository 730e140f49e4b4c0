//! SQLite adapter for the four outbound safety contracts.
//!
//! A single connection behind a `Mutex`; every trait call holds the lock for
//! the duration of one repository operation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::repository::{self, OverrideWrite};
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{CandidateDrug, InteractionRule, PatientSafetyProfile};
use crate::safety::providers::{AuditStore, DrugDataProvider, PatientDataProvider, TenantRuleStore};
use crate::safety::types::{AuditedFinding, DateRange, OverrideCounts, SafetyError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = open_database(path)?;
        tracing::debug!(path = %path.display(), "SQLite store opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SafetyError> {
        self.conn.lock().map_err(|_| SafetyError::LockFailed)
    }

    /// Run a repository operation against the shared connection. Used for
    /// seeding and maintenance (tenant rules, prescriptions).
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, SafetyError> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }
}

impl PatientDataProvider for SqliteStore {
    fn load_profile(
        &self,
        tenant_id: &str,
        patient_id: &str,
        exclude_prescription_id: Option<&str>,
    ) -> Result<PatientSafetyProfile, SafetyError> {
        let conn = self.lock()?;
        repository::load_safety_profile(&conn, tenant_id, patient_id, exclude_prescription_id)
            .map_err(|e| match e {
                DatabaseError::NotFound { id, .. } => SafetyError::PatientNotFound(id),
                other => SafetyError::PatientDataUnavailable(other.to_string()),
            })
    }
}

impl DrugDataProvider for SqliteStore {
    fn resolve_drugs(&self, drug_ids: &[String]) -> Result<Vec<CandidateDrug>, SafetyError> {
        let conn = self.lock()?;
        Ok(repository::resolve_drugs(&conn, drug_ids)?)
    }
}

impl TenantRuleStore for SqliteStore {
    fn active_rules(&self, tenant_id: &str) -> Result<Vec<InteractionRule>, SafetyError> {
        let conn = self.lock()?;
        repository::fetch_active_rules(&conn, tenant_id)
            .map_err(|e| SafetyError::RuleSourceUnavailable(e.to_string()))
    }
}

impl AuditStore for SqliteStore {
    fn append(&self, records: &[AuditedFinding]) -> Result<(), SafetyError> {
        let conn = self.lock()?;
        repository::insert_audited_findings(&conn, records)
            .map_err(|e| SafetyError::AuditUnavailable(e.to_string()))
    }

    fn get(&self, id: &Uuid) -> Result<Option<AuditedFinding>, SafetyError> {
        let conn = self.lock()?;
        Ok(repository::get_audited_finding(&conn, id)?)
    }

    fn mark_overridden(
        &self,
        id: &Uuid,
        user_id: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), SafetyError> {
        let conn = self.lock()?;
        let outcome = repository::mark_finding_overridden(&conn, id, user_id, reason, at)
            .map_err(|e| SafetyError::AuditUnavailable(e.to_string()))?;
        match outcome {
            OverrideWrite::Applied => Ok(()),
            OverrideWrite::AlreadyOverridden => Err(SafetyError::AlreadyOverridden(*id)),
            OverrideWrite::NotFound => Err(SafetyError::AuditedFindingNotFound(*id)),
        }
    }

    fn mark_overridden_all(
        &self,
        ids: &[Uuid],
        user_id: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), SafetyError> {
        let conn = self.lock()?;
        let failed = repository::mark_findings_overridden(&conn, ids, user_id, reason, at)
            .map_err(|e| SafetyError::AuditUnavailable(e.to_string()))?;
        match failed {
            None | Some((_, OverrideWrite::Applied)) => Ok(()),
            Some((id, OverrideWrite::AlreadyOverridden)) => Err(SafetyError::AlreadyOverridden(id)),
            Some((id, OverrideWrite::NotFound)) => Err(SafetyError::AuditedFindingNotFound(id)),
        }
    }

    fn override_counts(
        &self,
        tenant_id: &str,
        range: Option<DateRange>,
    ) -> Result<OverrideCounts, SafetyError> {
        let conn = self.lock()?;
        Ok(repository::count_findings(&conn, tenant_id, range)?)
    }

    fn list_for_patient(
        &self,
        tenant_id: &str,
        patient_id: &str,
    ) -> Result<Vec<AuditedFinding>, SafetyError> {
        let conn = self.lock()?;
        Ok(repository::list_findings_for_patient(&conn, tenant_id, patient_id)?)
    }
}
