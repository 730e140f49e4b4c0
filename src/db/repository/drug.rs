use rusqlite::{params, params_from_iter, Connection};

use crate::db::DatabaseError;
use crate::models::CandidateDrug;

pub fn insert_drug(conn: &Connection, drug: &CandidateDrug) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO drugs (id, generic_name, brand_name) VALUES (?1, ?2, ?3)",
        params![drug.id, drug.generic_name, drug.brand_name],
    )?;
    Ok(())
}

/// Look up formulary entries by id. Unknown ids are simply absent from the
/// result; callers decide whether that is an error.
pub fn resolve_drugs(
    conn: &Connection,
    drug_ids: &[String],
) -> Result<Vec<CandidateDrug>, DatabaseError> {
    if drug_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; drug_ids.len()].join(", ");
    let sql = format!(
        "SELECT id, generic_name, brand_name FROM drugs WHERE id IN ({placeholders})"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(drug_ids.iter()), |row| {
            Ok(CandidateDrug {
                id: row.get(0)?,
                generic_name: row.get(1)?,
                brand_name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn resolves_known_ids_only() {
        let conn = open_memory_database().unwrap();
        let mut amox = CandidateDrug::new("d1", "amoxicillin");
        amox.brand_name = Some("Amoxil".into());
        insert_drug(&conn, &amox).unwrap();
        insert_drug(&conn, &CandidateDrug::new("d2", "warfarin")).unwrap();

        let mut found = resolve_drugs(&conn, &["d1".into(), "missing".into()]).unwrap();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(found, vec![amox]);
    }

    #[test]
    fn empty_request_resolves_nothing() {
        let conn = open_memory_database().unwrap();
        assert!(resolve_drugs(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let conn = open_memory_database().unwrap();
        insert_drug(&conn, &CandidateDrug::new("d1", "aspirin")).unwrap();
        assert!(insert_drug(&conn, &CandidateDrug::new("d1", "aspirin")).is_err());
    }
}
