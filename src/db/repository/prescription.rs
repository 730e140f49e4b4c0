use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::PrescriptionStatus;

/// Insert a prescription with one item per drug id, atomically.
pub fn insert_prescription(
    conn: &Connection,
    tenant_id: &str,
    prescription_id: &str,
    patient_id: &str,
    status: PrescriptionStatus,
    drug_ids: &[String],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO prescriptions (id, tenant_id, patient_id, status) VALUES (?1, ?2, ?3, ?4)",
        params![prescription_id, tenant_id, patient_id, status.as_str()],
    )?;
    for drug_id in drug_ids {
        tx.execute(
            "INSERT INTO prescription_items (prescription_id, drug_id) VALUES (?1, ?2)",
            params![prescription_id, drug_id],
        )?;
    }

    tx.commit()?;
    Ok(())
}

pub fn update_prescription_status(
    conn: &Connection,
    prescription_id: &str,
    status: PrescriptionStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?1 WHERE id = ?2",
        params![status.as_str(), prescription_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Prescription".into(),
            id: prescription_id.to_string(),
        });
    }
    Ok(())
}
