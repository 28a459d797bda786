//! Observation table layouts, derived from the field schema
//!
//! - `observations`: canonical records, `UNIQUE(match_number, team_number, alliance)`
//! - `parked_observations`: conflicting duplicates, same columns, no uniqueness
//! - `observation_accuracy`: read-only view of made/missed percentages
//! - `maintenance_lock`: single-holder lock for reconciliation passes
//! - `store_meta`: key/value bookkeeping (field schema version)

use crate::db::schema_sync::{self, ColumnDefinition, TableDefinition};
use crate::record::FieldValue;
use crate::schema::{ids, FieldDescriptor, FieldSchema, FieldType};
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const OBSERVATIONS: &str = "observations";
pub const PARKED_OBSERVATIONS: &str = "parked_observations";
pub const ACCURACY_VIEW: &str = "observation_accuracy";

/// Column holding the client submission timestamp (payload key `timestamp`)
pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";
pub const INGESTED_AT_COLUMN: &str = "ingested_at";

/// Column name for a field id
pub fn column_name(field_id: &str) -> &str {
    if field_id == ids::SUBMITTED_AT {
        SUBMITTED_AT_COLUMN
    } else {
        field_id
    }
}

/// Quote a string as an SQL literal
pub fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn sql_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Text(s) => sql_string(s),
    }
}

fn field_column(field: &FieldDescriptor) -> ColumnDefinition {
    let name = column_name(&field.id).to_string();
    let column = match &field.field_type {
        FieldType::Counter { min, max } => ColumnDefinition::new(&name, "INTEGER")
            .check(format!("{} BETWEEN {} AND {}", name, min, max)),
        FieldType::Boolean => {
            ColumnDefinition::new(&name, "INTEGER").check(format!("{} IN (0, 1)", name))
        }
        FieldType::Choice { options } => {
            let options: Vec<String> = options.iter().map(|o| sql_string(o)).collect();
            ColumnDefinition::new(&name, "TEXT").check(format!("{} IN ({})", name, options.join(", ")))
        }
        FieldType::Text { .. } | FieldType::Timestamp => ColumnDefinition::new(&name, "TEXT"),
    }
    .not_null();

    if field.is_reserved() {
        column
    } else {
        match field.default_value() {
            Some(default) => column.default(sql_literal(&default)),
            None => column,
        }
    }
}

/// Columns shared by the canonical and parked tables
pub fn observation_columns(schema: &FieldSchema) -> Vec<ColumnDefinition> {
    let mut columns = vec![ColumnDefinition::new("id", "INTEGER").primary_key()];

    for id in ids::RESERVED {
        if let Some(field) = schema.field(id) {
            columns.push(field_column(field));
        }
    }
    columns.push(ColumnDefinition::new(INGESTED_AT_COLUMN, "TEXT").not_null());

    columns.extend(schema.attribute_fields().map(field_column));
    columns
}

pub fn observations_table(schema: &FieldSchema) -> TableDefinition {
    TableDefinition::new(OBSERVATIONS, observation_columns(schema))
        .constraint("UNIQUE(match_number, team_number, alliance)")
}

pub fn parked_observations_table(schema: &FieldSchema) -> TableDefinition {
    TableDefinition::new(PARKED_OBSERVATIONS, observation_columns(schema))
}

pub fn maintenance_lock_table() -> TableDefinition {
    TableDefinition::new(
        "maintenance_lock",
        vec![
            ColumnDefinition::new("name", "TEXT").not_null(),
            ColumnDefinition::new("holder", "TEXT").not_null(),
            ColumnDefinition::new("acquired_at", "TEXT").not_null(),
        ],
    )
    .constraint("PRIMARY KEY(name)")
}

pub fn store_meta_table() -> TableDefinition {
    TableDefinition::new(
        "store_meta",
        vec![
            ColumnDefinition::new("key", "TEXT").not_null(),
            ColumnDefinition::new("value", "TEXT"),
        ],
    )
    .constraint("PRIMARY KEY(key)")
}

/// `CREATE VIEW` for the accuracy projection
///
/// One row per canonical record; for each metric, the made and missed totals
/// and the made percentage (NULL when nothing was attempted).
pub fn accuracy_view_sql(schema: &FieldSchema) -> String {
    let mut select = vec![
        "id".to_string(),
        "match_number".to_string(),
        "team_number".to_string(),
        "alliance".to_string(),
    ];

    for metric in &schema.metrics {
        let sum = |ids: &[String]| {
            if ids.is_empty() {
                "0".to_string()
            } else {
                format!("({})", ids.join(" + "))
            }
        };
        let made = sum(&metric.made);
        let missed = sum(&metric.missed);
        select.push(format!("{} AS {}_made", made, metric.name));
        select.push(format!("{} AS {}_missed", missed, metric.name));
        select.push(format!(
            "CASE WHEN {made} + {missed} > 0 THEN ROUND(100.0 * {made} / ({made} + {missed}), 1) ELSE NULL END AS {name}_pct",
            made = made,
            missed = missed,
            name = metric.name
        ));
    }

    format!(
        "CREATE VIEW {} AS SELECT {} FROM {}",
        ACCURACY_VIEW,
        select.join(", "),
        OBSERVATIONS
    )
}

/// Create/sync every store table and rebuild the accuracy view
pub async fn sync_all_table_schemas(pool: &SqlitePool, schema: &FieldSchema) -> Result<()> {
    info!("Synchronizing store tables for field schema v{}", schema.version);

    schema_sync::sync_table(pool, &observations_table(schema)).await?;
    schema_sync::sync_table(pool, &parked_observations_table(schema)).await?;
    schema_sync::sync_table(pool, &maintenance_lock_table()).await?;
    schema_sync::sync_table(pool, &store_meta_table()).await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_parked_identity \
         ON parked_observations (match_number, team_number, alliance)",
    )
    .execute(pool)
    .await?;

    // The view's columns follow the metric list, so it is always rebuilt
    sqlx::query(&format!("DROP VIEW IF EXISTS {}", ACCURACY_VIEW))
        .execute(pool)
        .await?;
    sqlx::query(&accuracy_view_sql(schema)).execute(pool).await?;

    record_schema_version(pool, schema.version).await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool, version: u32) -> Result<()> {
    let stored: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        "SELECT value FROM store_meta WHERE key = 'field_schema_version'",
    )
    .fetch_optional(pool)
    .await?
    .flatten();

    let current = version.to_string();
    match stored {
        Some(ref v) if *v == current => {}
        Some(v) => warn!(
            "Field schema changed from v{} to v{}; existing rows keep defaults for new fields",
            v, current
        ),
        None => info!("Recording field schema v{}", current),
    }

    sqlx::query(
        "INSERT INTO store_meta (key, value) VALUES ('field_schema_version', ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(&current)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_columns_follow_schema() {
        let schema = FieldSchema::builtin();
        let columns = observation_columns(&schema);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(
            &names[..7],
            &["id", "match_number", "team_number", "alliance", "scouter_name", "submitted_at", "ingested_at"]
        );
        assert_eq!(names.len(), 7 + schema.attribute_fields().count());
        assert!(names.contains(&"auto_taxi"));
        assert!(!names.contains(&"timestamp"));
    }

    #[test]
    fn test_field_column_constraints() {
        let schema = FieldSchema::builtin();
        let columns = observation_columns(&schema);
        let col = |n: &str| columns.iter().find(|c| c.name == n).unwrap().clone();

        let upper = col("auto_balls_scored_upper");
        assert_eq!(upper.default_value.as_deref(), Some("0"));
        assert_eq!(upper.check.as_deref(), Some("auto_balls_scored_upper BETWEEN 0 AND 20"));

        let alliance = col("alliance");
        assert_eq!(alliance.check.as_deref(), Some("alliance IN ('Red', 'Blue')"));
        assert!(alliance.default_value.is_none());

        assert_eq!(col("climb_level").default_value.as_deref(), Some("''"));
        assert_eq!(col("broke_down").check.as_deref(), Some("broke_down IN (0, 1)"));
    }

    #[test]
    fn test_sql_string_escapes_quotes() {
        assert_eq!(sql_string("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_accuracy_view_sql() {
        let sql = accuracy_view_sql(&FieldSchema::builtin());
        assert!(sql.starts_with("CREATE VIEW observation_accuracy AS SELECT"));
        assert!(sql.contains(
            "(teleop_balls_scored_upper + teleop_balls_scored_lower) AS teleop_accuracy_made"
        ));
        assert!(sql.contains("(teleop_balls_missed) AS teleop_accuracy_missed"));
        assert!(sql.contains("AS teleop_accuracy_pct"));
    }
}
