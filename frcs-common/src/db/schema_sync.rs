//! Automatic Schema Synchronization
//!
//! The observation tables are generated from the field schema, so their
//! expected layout is only known at runtime. On startup each table is created
//! if missing, then compared against the database and any missing column is
//! added with `ALTER TABLE ADD COLUMN`.
//!
//! **What this CAN fix:**
//! - Missing columns (a field was added to the schema)
//!
//! **What this CANNOT fix (logged, left for a manual migration):**
//! - Type changes
//! - Constraint changes (SQLite needs a table rebuild)
//! - Column removal (a field dropped from the schema keeps its column)

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint (INTEGER PRIMARY KEY AUTOINCREMENT)
    pub primary_key: bool,
    /// DEFAULT value, as an SQL literal
    pub default_value: Option<String>,
    /// CHECK expression, without the CHECK keyword
    pub check: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
            check: None,
        }
    }

    /// Mark column as auto-increment PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set CHECK expression
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    fn column_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" CHECK({})", check));
        }
        sql
    }
}

/// Expected layout of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    /// Column order matters for new table creation
    pub columns: Vec<ColumnDefinition>,
    /// Table-level constraints, e.g. `UNIQUE(a, b)`
    pub constraints: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
            constraints: Vec::new(),
        }
    }

    /// Add a table-level constraint
    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// `CREATE TABLE IF NOT EXISTS` statement
    pub fn create_sql(&self) -> String {
        let body: Vec<String> = self
            .columns
            .iter()
            .map(ColumnDefinition::column_sql)
            .chain(self.constraints.iter().cloned())
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            body.join(",\n    ")
        )
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    pub name: String,
    /// SQL type from PRAGMA table_info
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub pk: bool,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (cannot auto-fix - requires manual migration)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Constraint mismatch (cannot auto-fix - requires manual migration)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String,
    },
}

/// Schema introspection via PRAGMA table_info
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns, in database order (by cid)
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compare expected schema to actual database schema
pub fn compare(table: &TableDefinition, actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();

    for expected in &table.columns {
        let Some(found) = actual.iter().find(|c| c.name == expected.name) else {
            drift.push(SchemaDrift::MissingColumn {
                table: table.name.clone(),
                column: expected.clone(),
            });
            continue;
        };

        if !types_compatible(&expected.sql_type, &found.type_name) {
            drift.push(SchemaDrift::TypeMismatch {
                table: table.name.clone(),
                column: expected.name.clone(),
                expected: expected.sql_type.clone(),
                actual: found.type_name.clone(),
            });
        }

        if expected.not_null && !found.not_null && !expected.primary_key {
            drift.push(SchemaDrift::ConstraintMismatch {
                table: table.name.clone(),
                column: expected.name.clone(),
                constraint: "NOT NULL".to_string(),
            });
        }

        if expected.primary_key && !found.pk {
            drift.push(SchemaDrift::ConstraintMismatch {
                table: table.name.clone(),
                column: expected.name.clone(),
                constraint: "PRIMARY KEY".to_string(),
            });
        }
    }

    drift
}

/// SQLite type affinity: INTEGER and TEXT families compare equal within themselves
fn types_compatible(expected: &str, actual: &str) -> bool {
    let exp = expected.to_uppercase();
    let act = actual.to_uppercase();

    if exp == act {
        return true;
    }

    if exp.contains("INT") && act.contains("INT") {
        return true;
    }

    let texty = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
    texty(&exp) && texty(&act)
}

/// Create the table if missing, then add any missing columns
pub async fn sync_table(pool: &SqlitePool, table: &TableDefinition) -> Result<()> {
    sqlx::query(&table.create_sql()).execute(pool).await?;

    let actual = SchemaIntrospector::introspect_table(pool, &table.name).await?;
    let drift = compare(table, &actual);

    if drift.is_empty() {
        debug!("Schema up to date for '{}'", table.name);
        return Ok(());
    }

    for change in drift {
        match change {
            SchemaDrift::MissingColumn { table, column } => {
                add_column(pool, &table, &column).await?;
            }
            SchemaDrift::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => {
                warn!(
                    "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                    table, column, expected, actual
                );
            }
            SchemaDrift::ConstraintMismatch {
                table,
                column,
                constraint,
            } => {
                warn!(
                    "Constraint mismatch in {}.{}: missing '{}'. Manual migration required.",
                    table, column, constraint
                );
            }
        }
    }

    Ok(())
}

/// Add missing column to table via ALTER TABLE ADD COLUMN
async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table, column.name, column.sql_type
    );

    // SQLite ALTER TABLE ADD COLUMN limitations:
    // - PRIMARY KEY: not supported
    // - NOT NULL: only with a DEFAULT value
    if column.primary_key {
        warn!(
            "Cannot add PRIMARY KEY column {}.{} via ALTER TABLE. \
             Column will be created without PRIMARY KEY constraint.",
            table, column.name
        );
    }

    match (&column.default_value, column.not_null) {
        (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
        (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
        (None, true) => warn!(
            "Cannot add NOT NULL column {}.{} without DEFAULT value. Column will be nullable.",
            table, column.name
        ),
        (None, false) => {}
    }

    if let Some(check) = &column.check {
        sql.push_str(&format!(" CHECK({})", check));
    }

    info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            // Another process added it between introspection and ALTER
            debug!("Column {}.{} already added concurrently", table, column.name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
