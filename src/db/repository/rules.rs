use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::{RuleOrigin, Severity};
use crate::models::InteractionRule;

fn keywords_to_json(keywords: &[String]) -> String {
    serde_json::to_string(keywords).unwrap_or_else(|_| "[]".to_string())
}

fn keywords_from_json(column: &str, raw: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("{column}: {e}")))
}

/// Store a tenant-authored interaction rule. Origin is always TENANT.
pub fn insert_tenant_rule(
    conn: &Connection,
    tenant_id: &str,
    rule: &InteractionRule,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO tenant_interaction_rules
         (id, tenant_id, group_a, group_b, severity, message, management, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rule.id,
            tenant_id,
            keywords_to_json(&rule.group_a),
            keywords_to_json(&rule.group_b),
            rule.severity.as_str(),
            rule.message,
            rule.management,
            rule.active as i32,
        ],
    )?;
    Ok(())
}

pub fn set_tenant_rule_active(
    conn: &Connection,
    tenant_id: &str,
    rule_id: &str,
    active: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE tenant_interaction_rules SET is_active = ?1 WHERE id = ?2 AND tenant_id = ?3",
        params![active as i32, rule_id, tenant_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "TenantInteractionRule".into(),
            id: rule_id.to_string(),
        });
    }
    Ok(())
}

/// Active rules for a tenant, oldest first. Keywords are returned as stored;
/// normalization happens in the merger.
pub fn fetch_active_rules(
    conn: &Connection,
    tenant_id: &str,
) -> Result<Vec<InteractionRule>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, group_a, group_b, severity, message, management
         FROM tenant_interaction_rules
         WHERE tenant_id = ?1 AND is_active = 1
         ORDER BY created_at, rowid",
    )?;

    let rows = stmt.query_map(params![tenant_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut rules = Vec::new();
    for row in rows {
        let (id, group_a, group_b, severity, message, management) = row?;
        rules.push(InteractionRule {
            id,
            group_a: keywords_from_json("group_a", &group_a)?,
            group_b: keywords_from_json("group_b", &group_b)?,
            severity: Severity::from_str(&severity)?,
            message,
            management,
            origin: RuleOrigin::Tenant,
            active: true,
        });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn rule(id: &str, active: bool) -> InteractionRule {
        InteractionRule {
            id: id.into(),
            group_a: vec!["Clopidogrel".into()],
            group_b: vec!["omeprazole".into(), "esomeprazole".into()],
            severity: Severity::Warning,
            message: "PPI may reduce clopidogrel activation.".into(),
            management: "Prefer pantoprazole.".into(),
            origin: RuleOrigin::Builtin,
            active,
        }
    }

    #[test]
    fn fetch_returns_active_tenant_rules() {
        let conn = open_memory_database().unwrap();
        insert_tenant_rule(&conn, "t1", &rule("r1", true)).unwrap();
        insert_tenant_rule(&conn, "t1", &rule("r2", false)).unwrap();
        insert_tenant_rule(&conn, "t2", &rule("r3", true)).unwrap();

        let rules = fetch_active_rules(&conn, "t1").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "r1");
        assert_eq!(rules[0].origin, RuleOrigin::Tenant);
        assert_eq!(rules[0].group_b, vec!["omeprazole".to_string(), "esomeprazole".to_string()]);
    }

    #[test]
    fn deactivate_and_reactivate() {
        let conn = open_memory_database().unwrap();
        insert_tenant_rule(&conn, "t1", &rule("r1", true)).unwrap();

        set_tenant_rule_active(&conn, "t1", "r1", false).unwrap();
        assert!(fetch_active_rules(&conn, "t1").unwrap().is_empty());

        set_tenant_rule_active(&conn, "t1", "r1", true).unwrap();
        assert_eq!(fetch_active_rules(&conn, "t1").unwrap().len(), 1);
    }

    #[test]
    fn toggle_scoped_to_tenant() {
        let conn = open_memory_database().unwrap();
        insert_tenant_rule(&conn, "t1", &rule("r1", true)).unwrap();
        assert!(matches!(
            set_tenant_rule_active(&conn, "t2", "r1", false),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_keyword_column_is_reported() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO tenant_interaction_rules (id, tenant_id, group_a, group_b, severity, message)
             VALUES ('bad', 't1', 'not json', '[]', 'INFO', 'm')",
            [],
        )
        .unwrap();
        assert!(matches!(
            fetch_active_rules(&conn, "t1"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }
}
