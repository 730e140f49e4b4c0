use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{EvaluationContext, Severity};
use crate::safety::types::{AuditedFinding, DateRange, FindingDetail, OverrideCounts, SafetyFinding};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of the override check-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideWrite {
    Applied,
    AlreadyOverridden,
    NotFound,
}

const FINDING_COLUMNS: &str = "id, tenant_id, patient_id, context, encounter_id, prescription_id,
     severity, drug_id, drug_name, message, details, can_override, detail_json,
     created_at, was_overridden, overridden_by, override_reason, overridden_at";

/// Append audited findings in a single transaction.
pub fn insert_audited_findings(
    conn: &Connection,
    records: &[AuditedFinding],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO audited_findings
             (id, tenant_id, patient_id, context, encounter_id, prescription_id,
              finding_type, severity, drug_id, drug_name, message, details, can_override,
              detail_json, created_at, was_overridden, overridden_by, override_reason, overridden_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        )?;

        for record in records {
            let finding = &record.finding;
            let detail_json =
                serde_json::to_string(&finding.detail).unwrap_or_else(|_| "{}".to_string());
            stmt.execute(params![
                record.id.to_string(),
                record.tenant_id,
                record.patient_id,
                record.context.as_str(),
                record.encounter_id,
                record.prescription_id,
                finding.finding_type().as_str(),
                finding.severity.as_str(),
                finding.drug_id,
                finding.drug_name,
                finding.message,
                finding.details,
                finding.can_override as i32,
                detail_json,
                record.created_at.format(TIMESTAMP_FORMAT).to_string(),
                record.was_overridden as i32,
                record.overridden_by,
                record.override_reason,
                record.overridden_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_audited_finding(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AuditedFinding>, DatabaseError> {
    let sql = format!("SELECT {FINDING_COLUMNS} FROM audited_findings WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;
    row.map(parse_row).transpose()
}

/// Set the override fields only if the finding has not been overridden.
/// The guard lives in the UPDATE so concurrent overrides cannot both apply.
pub fn mark_finding_overridden(
    conn: &Connection,
    id: &Uuid,
    user_id: &str,
    reason: &str,
    at: NaiveDateTime,
) -> Result<OverrideWrite, DatabaseError> {
    let changed = conn.execute(
        "UPDATE audited_findings
         SET was_overridden = 1, overridden_by = ?2, override_reason = ?3, overridden_at = ?4
         WHERE id = ?1 AND was_overridden = 0",
        params![
            id.to_string(),
            user_id,
            reason,
            at.format(TIMESTAMP_FORMAT).to_string()
        ],
    )?;
    if changed == 1 {
        return Ok(OverrideWrite::Applied);
    }

    let exists = conn
        .query_row(
            "SELECT 1 FROM audited_findings WHERE id = ?1",
            params![id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(match exists {
        Some(()) => OverrideWrite::AlreadyOverridden,
        None => OverrideWrite::NotFound,
    })
}

/// Override several findings in one transaction. On the first id that does
/// not apply, nothing is committed and that id is returned with its outcome.
pub fn mark_findings_overridden(
    conn: &Connection,
    ids: &[Uuid],
    user_id: &str,
    reason: &str,
    at: NaiveDateTime,
) -> Result<Option<(Uuid, OverrideWrite)>, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    for id in ids {
        let outcome = mark_finding_overridden(&tx, id, user_id, reason, at)?;
        if outcome != OverrideWrite::Applied {
            return Ok(Some((*id, outcome)));
        }
    }
    tx.commit()?;
    Ok(None)
}

/// Totals for override statistics. The range is inclusive on calendar days.
pub fn count_findings(
    conn: &Connection,
    tenant_id: &str,
    range: Option<DateRange>,
) -> Result<OverrideCounts, DatabaseError> {
    let (from, to) = match range {
        Some(r) => (
            Some(r.from.format("%Y-%m-%d").to_string()),
            Some(r.to.format("%Y-%m-%d").to_string()),
        ),
        None => (None, None),
    };

    let counts = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(was_overridden), 0),
                COALESCE(SUM(CASE WHEN severity = 'CRITICAL' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN severity = 'CRITICAL' AND was_overridden = 1 THEN 1 ELSE 0 END), 0)
         FROM audited_findings
         WHERE tenant_id = ?1
           AND (?2 IS NULL OR date(created_at) >= ?2)
           AND (?3 IS NULL OR date(created_at) <= ?3)",
        params![tenant_id, from, to],
        |row| {
            Ok(OverrideCounts {
                total: row.get::<_, i64>(0)? as u64,
                overridden: row.get::<_, i64>(1)? as u64,
                critical: row.get::<_, i64>(2)? as u64,
                critical_overridden: row.get::<_, i64>(3)? as u64,
            })
        },
    )?;
    Ok(counts)
}

/// A patient's audited findings, newest first.
pub fn list_findings_for_patient(
    conn: &Connection,
    tenant_id: &str,
    patient_id: &str,
) -> Result<Vec<AuditedFinding>, DatabaseError> {
    let sql = format!(
        "SELECT {FINDING_COLUMNS} FROM audited_findings
         WHERE tenant_id = ?1 AND patient_id = ?2
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, patient_id], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(parse_row).collect()
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct FindingRow {
    id: String,
    tenant_id: String,
    patient_id: String,
    context: String,
    encounter_id: Option<String>,
    prescription_id: Option<String>,
    severity: String,
    drug_id: String,
    drug_name: String,
    message: String,
    details: String,
    can_override: i32,
    detail_json: String,
    created_at: String,
    was_overridden: i32,
    overridden_by: Option<String>,
    override_reason: Option<String>,
    overridden_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<FindingRow> {
    Ok(FindingRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        patient_id: row.get(2)?,
        context: row.get(3)?,
        encounter_id: row.get(4)?,
        prescription_id: row.get(5)?,
        severity: row.get(6)?,
        drug_id: row.get(7)?,
        drug_name: row.get(8)?,
        message: row.get(9)?,
        details: row.get(10)?,
        can_override: row.get(11)?,
        detail_json: row.get(12)?,
        created_at: row.get(13)?,
        was_overridden: row.get(14)?,
        overridden_by: row.get(15)?,
        override_reason: row.get(16)?,
        overridden_at: row.get(17)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("timestamp '{raw}': {e}")))
}

fn parse_row(row: FindingRow) -> Result<AuditedFinding, DatabaseError> {
    let detail: FindingDetail = serde_json::from_str(&row.detail_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("detail_json: {e}")))?;

    Ok(AuditedFinding {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        tenant_id: row.tenant_id,
        patient_id: row.patient_id,
        context: EvaluationContext::from_str(&row.context)?,
        encounter_id: row.encounter_id,
        prescription_id: row.prescription_id,
        finding: SafetyFinding {
            severity: Severity::from_str(&row.severity)?,
            drug_id: row.drug_id,
            drug_name: row.drug_name,
            message: row.message,
            details: row.details,
            can_override: row.can_override != 0,
            detail,
        },
        created_at: parse_timestamp(&row.created_at)?,
        was_overridden: row.was_overridden != 0,
        overridden_by: row.overridden_by,
        override_reason: row.override_reason,
        overridden_at: row.overridden_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
