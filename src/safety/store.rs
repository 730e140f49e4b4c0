use std::sync::RwLock;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::providers::AuditStore;
use super::types::{AuditedFinding, DateRange, OverrideCounts, SafetyError};

/// In-memory audit store backed by RwLock.
/// Used in tests and by deployments that ship audit records elsewhere.
pub struct MemoryAuditStore {
    pub(crate) records: RwLock<Vec<AuditedFinding>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> Result<usize, SafetyError> {
        Ok(self.records.read().map_err(|_| SafetyError::LockFailed)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SafetyError> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, records: &[AuditedFinding]) -> Result<(), SafetyError> {
        let mut all = self.records.write().map_err(|_| SafetyError::LockFailed)?;
        all.extend_from_slice(records);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Option<AuditedFinding>, SafetyError> {
        let all = self.records.read().map_err(|_| SafetyError::LockFailed)?;
        Ok(all.iter().find(|r| r.id == *id).cloned())
    }

    fn mark_overridden(
        &self,
        id: &Uuid,
        user_id: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), SafetyError> {
        self.mark_overridden_all(std::slice::from_ref(id), user_id, reason, at)
    }

    fn mark_overridden_all(
        &self,
        ids: &[Uuid],
        user_id: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), SafetyError> {
        let mut all = self.records.write().map_err(|_| SafetyError::LockFailed)?;

        // Resolve every id before touching any record. A repeated id counts
        // as already overridden, matching the guarded UPDATE in SQLite.
        let mut positions: Vec<usize> = Vec::with_capacity(ids.len());
        for id in ids {
            let pos = overridable_position(&all, id)?;
            if positions.contains(&pos) {
                return Err(SafetyError::AlreadyOverridden(*id));
            }
            positions.push(pos);
        }

        for pos in positions {
            let record = &mut all[pos];
            record.was_overridden = true;
            record.overridden_by = Some(user_id.to_string());
            record.override_reason = Some(reason.to_string());
            record.overridden_at = Some(at);
        }
        Ok(())
    }

    fn override_counts(
        &self,
        tenant_id: &str,
        range: Option<DateRange>,
    ) -> Result<OverrideCounts, SafetyError> {
        let all = self.records.read().map_err(|_| SafetyError::LockFailed)?;

        let mut counts = OverrideCounts::default();
        for record in all.iter().filter(|r| {
            r.tenant_id == tenant_id && range.map_or(true, |rg| rg.contains(r.created_at))
        }) {
            counts.total += 1;
            let critical = record.finding.is_critical();
            if critical {
                counts.critical += 1;
            }
            if record.was_overridden {
                counts.overridden += 1;
                if critical {
                    counts.critical_overridden += 1;
                }
            }
        }
        Ok(counts)
    }

    fn list_for_patient(
        &self,
        tenant_id: &str,
        patient_id: &str,
    ) -> Result<Vec<AuditedFinding>, SafetyError> {
        let all = self.records.read().map_err(|_| SafetyError::LockFailed)?;
        // Reverse insertion order so records logged in the same second
        // still come back newest first after the stable sort.
        let mut matching: Vec<AuditedFinding> = all
            .iter()
            .rev()
            .filter(|r| r.tenant_id == tenant_id && r.patient_id == patient_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

fn overridable_position(records: &[AuditedFinding], id: &Uuid) -> Result<usize, SafetyError> {
    let pos = records
        .iter()
        .position(|r| r.id == *id)
        .ok_or(SafetyError::AuditedFindingNotFound(*id))?;
    if records[pos].was_overridden {
        return Err(SafetyError::AlreadyOverridden(*id));
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::enums::{EvaluationContext, Severity};
    use crate::safety::types::{DuplicateDetail, FindingDetail, SafetyFinding};

    fn logged_at(created_at: NaiveDateTime) -> AuditedFinding {
        AuditedFinding {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            patient_id: "p1".into(),
            context: EvaluationContext::Dispensing,
            encounter_id: None,
            prescription_id: None,
            finding: SafetyFinding {
                severity: Severity::Critical,
                drug_id: "d1".into(),
                drug_name: "aspirin".into(),
                message: "DUPLICATE THERAPY: aspirin is already prescribed".into(),
                details: String::new(),
                can_override: false,
                detail: FindingDetail::Duplicate(DuplicateDetail {
                    active_drug_name: "aspirin".into(),
                }),
            },
            created_at,
            was_overridden: false,
            overridden_by: None,
            override_reason: None,
            overridden_at: None,
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn batch_override_leaves_all_untouched_on_failure() {
        let store = MemoryAuditStore::new();
        let fresh = logged_at(noon());
        let taken = logged_at(noon());
        store.append(&[fresh.clone(), taken.clone()]).unwrap();
        store.mark_overridden(&taken.id, "dr-a", "first", noon()).unwrap();

        match store.mark_overridden_all(&[fresh.id, taken.id], "dr-b", "batch", noon()) {
            Err(SafetyError::AlreadyOverridden(id)) => assert_eq!(id, taken.id),
            other => panic!("Expected AlreadyOverridden, got: {other:?}"),
        }
        assert!(!store.get(&fresh.id).unwrap().unwrap().was_overridden);

        match store.mark_overridden_all(&[fresh.id, Uuid::new_v4()], "dr-b", "batch", noon()) {
            Err(SafetyError::AuditedFindingNotFound(_)) => {}
            other => panic!("Expected AuditedFindingNotFound, got: {other:?}"),
        }
        assert!(!store.get(&fresh.id).unwrap().unwrap().was_overridden);
    }

    #[test]
    fn batch_override_applies_to_every_id() {
        let store = MemoryAuditStore::new();
        let records = vec![logged_at(noon()), logged_at(noon())];
        store.append(&records).unwrap();

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        store.mark_overridden_all(&ids, "dr-b", "reviewed", noon()).unwrap();

        let counts = store.override_counts("t1", None).unwrap();
        assert_eq!(counts.critical_overridden, 2);
        let stored = store.get(&ids[1]).unwrap().unwrap();
        assert_eq!(stored.override_reason.as_deref(), Some("reviewed"));
    }

    #[test]
    fn same_second_records_list_newest_first() {
        let store = MemoryAuditStore::new();
        let first = logged_at(noon());
        let second = logged_at(noon());
        store.append(&[first.clone()]).unwrap();
        store.append(&[second.clone()]).unwrap();

        let listed: Vec<Uuid> = store
            .list_for_patient("t1", "p1")
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }
}
