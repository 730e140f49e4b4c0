use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::PrescriptionStatus;
use crate::models::{Allergy, PatientSafetyProfile};

pub fn insert_patient(
    conn: &Connection,
    tenant_id: &str,
    patient_id: &str,
    date_of_birth: Option<NaiveDate>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, tenant_id, date_of_birth) VALUES (?1, ?2, ?3)",
        params![
            patient_id,
            tenant_id,
            date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
        ],
    )?;
    Ok(())
}

pub fn insert_patient_allergy(
    conn: &Connection,
    patient_id: &str,
    allergy: &Allergy,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_allergies (patient_id, allergen, reaction, severity)
         VALUES (?1, ?2, ?3, ?4)",
        params![patient_id, allergy.allergen, allergy.reaction, allergy.severity],
    )?;
    Ok(())
}

pub fn insert_chronic_condition(
    conn: &Connection,
    patient_id: &str,
    condition: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chronic_conditions (patient_id, condition) VALUES (?1, ?2)",
        params![patient_id, condition],
    )?;
    Ok(())
}

/// Assemble the safety snapshot for a patient of `tenant_id`.
///
/// Active medications are the generic names on the patient's PENDING,
/// DISPENSED and PARTIAL prescriptions, minus `exclude_prescription_id`.
/// Fails with `NotFound` when the patient does not exist in the tenant.
pub fn load_safety_profile(
    conn: &Connection,
    tenant_id: &str,
    patient_id: &str,
    exclude_prescription_id: Option<&str>,
) -> Result<PatientSafetyProfile, DatabaseError> {
    let dob: Option<Option<String>> = conn
        .query_row(
            "SELECT date_of_birth FROM patients WHERE id = ?1 AND tenant_id = ?2",
            params![patient_id, tenant_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;

    let Some(dob) = dob else {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient_id.to_string(),
        });
    };

    let date_of_birth = match dob {
        Some(s) => Some(NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
            DatabaseError::ConstraintViolation(format!("date_of_birth '{s}': {e}"))
        })?),
        None => None,
    };

    Ok(PatientSafetyProfile {
        patient_id: patient_id.to_string(),
        allergies: get_patient_allergies(conn, patient_id)?,
        active_drug_names: get_active_drug_names(conn, tenant_id, patient_id, exclude_prescription_id)?,
        chronic_conditions: get_chronic_conditions(conn, patient_id)?,
        date_of_birth,
    })
}

pub fn get_patient_allergies(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Allergy>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT allergen, reaction, severity FROM patient_allergies
         WHERE patient_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![patient_id], |row| {
            Ok(Allergy {
                allergen: row.get(0)?,
                reaction: row.get(1)?,
                severity: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_chronic_conditions(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT condition FROM chronic_conditions WHERE patient_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![patient_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_active_drug_names(
    conn: &Connection,
    tenant_id: &str,
    patient_id: &str,
    exclude_prescription_id: Option<&str>,
) -> Result<Vec<String>, DatabaseError> {
    let statuses = PrescriptionStatus::ACTIVE
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT DISTINCT d.generic_name
         FROM prescription_items pi
         JOIN prescriptions p ON p.id = pi.prescription_id
         JOIN drugs d ON d.id = pi.drug_id
         WHERE p.tenant_id = ?1 AND p.patient_id = ?2
           AND p.status IN ({statuses})
           AND (?3 IS NULL OR p.id <> ?3)
         ORDER BY d.generic_name"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, patient_id, exclude_prescription_id], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
