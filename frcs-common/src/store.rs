//! Record store
//!
//! Owns the canonical `observations` table and the `parked_observations`
//! side table. The identity invariant (at most one canonical row per
//! `(match, team, alliance)`) is enforced by the table's UNIQUE constraint,
//! so no writer, in this process or another, can bypass it.
//!
//! All mutation goes through three narrow operations:
//! - `commit`: insert-or-fail into the canonical table
//! - `park`: append a conflicting duplicate to the side table
//! - `replace`: one transaction retiring a conflict group and installing its survivor

use crate::db::table_schemas::{
    column_name, INGESTED_AT_COLUMN, OBSERVATIONS, PARKED_OBSERVATIONS,
};
use crate::record::{Alliance, FieldValue, IdentityKey, ObservationRecord};
use crate::schema::{ids, FieldSchema, FieldType};
use crate::time::{format_timestamp, now, parse_timestamp};
use crate::{Error, Result};
use futures::Stream;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the lock row held during a reconciliation pass
const RECONCILIATION_LOCK: &str = "reconciliation";

/// Which table a stored row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowTable {
    Canonical,
    Parked,
}

impl RowTable {
    fn table_name(&self) -> &'static str {
        match self {
            RowTable::Canonical => OBSERVATIONS,
            RowTable::Parked => PARKED_OBSERVATIONS,
        }
    }
}

/// Physical address of a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RowRef {
    pub table: RowTable,
    pub id: i64,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table {
            RowTable::Canonical => write!(f, "canonical #{}", self.id),
            RowTable::Parked => write!(f, "parked #{}", self.id),
        }
    }
}

/// A record together with where it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub row: RowRef,
    pub record: ObservationRecord,
}

/// Two or more stored records sharing one identity key
///
/// Members are in insertion order: the canonical row first, then parked rows
/// by id. `KeepIndex` positions refer to this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictGroup {
    pub key: IdentityKey,
    pub members: Vec<StoredRecord>,
}

impl ConflictGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ObservationRecord> {
        self.members.iter().map(|m| &m.record)
    }
}

/// Result of a bare insert into the canonical table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Accepted(RowRef),
    /// A canonical row already holds this identity key
    RejectedDuplicateKey,
}

/// Row counts for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub match_records: i64,
    pub parked_records: i64,
    pub unique_teams: i64,
    pub conflict_groups: i64,
}

/// SQLite-backed observation store
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    schema: Arc<FieldSchema>,
}

impl RecordStore {
    /// Open (or create) the store at `db_path`
    pub async fn open(db_path: &Path, schema: Arc<FieldSchema>) -> Result<Self> {
        let pool = crate::db::init_database(db_path, &schema).await?;
        Ok(Self { pool, schema })
    }

    /// Wrap a pool whose tables were already initialized for `schema`
    pub fn new(pool: SqlitePool, schema: Arc<FieldSchema>) -> Self {
        Self { pool, schema }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    /// Insert into the canonical table; never overwrites
    pub async fn commit(&self, record: &ObservationRecord) -> Result<CommitOutcome> {
        let sql = self.insert_sql(OBSERVATIONS);
        match self.bind_record(&sql, record).execute(&self.pool).await {
            Ok(result) => {
                let row = RowRef {
                    table: RowTable::Canonical,
                    id: result.last_insert_rowid(),
                };
                debug!("Committed {} as {}", record.key, row);
                Ok(CommitOutcome::Accepted(row))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!("Commit rejected, {} already present", record.key);
                Ok(CommitOutcome::RejectedDuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append a conflicting duplicate to the side table
    pub async fn park(&self, record: &ObservationRecord) -> Result<RowRef> {
        let sql = self.insert_sql(PARKED_OBSERVATIONS);
        let result = self.bind_record(&sql, record).execute(&self.pool).await?;
        Ok(RowRef {
            table: RowTable::Parked,
            id: result.last_insert_rowid(),
        })
    }

    /// Canonical record for a key
    pub async fn find_by_key(&self, key: &IdentityKey) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(&format!(
            "SELECT * FROM {} WHERE match_number = ? AND team_number = ? AND alliance = ?",
            OBSERVATIONS
        ))
        .bind(key.match_number as i64)
        .bind(key.team_number as i64)
        .bind(key.alliance.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.decode_row(RowTable::Canonical, &r)).transpose()
    }

    /// Every stored row for a key (canonical first, then parked by id)
    ///
    /// Both tables are read in one transaction, so a `replace` committing in
    /// between cannot yield a mixed group.
    pub async fn rows_for_key(&self, key: &IdentityKey) -> Result<Vec<StoredRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut members = Vec::new();

        for table in [RowTable::Canonical, RowTable::Parked] {
            let rows = sqlx::query(&format!(
                "SELECT * FROM {} WHERE match_number = ? AND team_number = ? AND alliance = ? ORDER BY id",
                table.table_name()
            ))
            .bind(key.match_number as i64)
            .bind(key.team_number as i64)
            .bind(key.alliance.as_str())
            .fetch_all(&mut *tx)
            .await?;

            for row in &rows {
                members.push(self.decode_row(table, row)?);
            }
        }

        tx.commit().await?;
        Ok(members)
    }

    /// Identity keys currently held by two or more rows, ordered by key
    pub async fn conflict_keys(&self) -> Result<Vec<IdentityKey>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT match_number, team_number, alliance FROM (
                SELECT match_number, team_number, alliance FROM {canonical}
                UNION ALL
                SELECT match_number, team_number, alliance FROM {parked}
            )
            GROUP BY match_number, team_number, alliance
            HAVING COUNT(*) >= 2
            ORDER BY match_number, team_number, alliance
            "#,
            canonical = OBSERVATIONS,
            parked = PARKED_OBSERVATIONS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_key).collect()
    }

    /// Lazy sequence of conflict groups
    ///
    /// Reads the database when polled, never a cached view; calling it again
    /// starts over from the current state. A key resolved between listing
    /// and fetching is skipped.
    pub fn all_grouped_by_key(&self) -> impl Stream<Item = Result<ConflictGroup>> + '_ {
        async_stream::try_stream! {
            let keys = self.conflict_keys().await?;
            for key in keys {
                let members = self.rows_for_key(&key).await?;
                if members.len() >= 2 {
                    yield ConflictGroup { key, members };
                }
            }
        }
    }

    /// Atomically retire every row of `group` and install `survivor` as the
    /// canonical record for its key
    ///
    /// Only the rows named by the group are deleted; a duplicate parked after
    /// the group was read stays parked. If any named row is already gone, or
    /// any statement fails, the transaction rolls back and the store is left
    /// exactly as it was.
    pub async fn replace(&self, group: &ConflictGroup, survivor: &ObservationRecord) -> Result<RowRef> {
        if survivor.key != group.key {
            return Err(Error::InvalidInput(format!(
                "Survivor key ({}) does not match group key ({})",
                survivor.key, group.key
            )));
        }

        let mut tx = self.pool.begin().await?;

        for member in &group.members {
            let result = sqlx::query(&format!(
                "DELETE FROM {} WHERE id = ? AND match_number = ? AND team_number = ? AND alliance = ?",
                member.row.table.table_name()
            ))
            .bind(member.row.id)
            .bind(group.key.match_number as i64)
            .bind(group.key.team_number as i64)
            .bind(group.key.alliance.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                // Dropping the transaction rolls it back
                return Err(Error::NotFound(format!(
                    "{} of {} is no longer stored",
                    member.row, group.key
                )));
            }
        }

        let sql = self.insert_sql(OBSERVATIONS);
        let result = self.bind_record(&sql, survivor).execute(&mut *tx).await?;
        tx.commit().await?;

        let row = RowRef {
            table: RowTable::Canonical,
            id: result.last_insert_rowid(),
        };
        info!(
            "Replaced {} rows of {} with survivor {}",
            group.len(),
            group.key,
            row
        );
        Ok(row)
    }

    /// Most recently ingested canonical records
    pub async fn recent(&self, limit: i64) -> Result<Vec<ObservationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM {} ORDER BY {} DESC, id DESC LIMIT ?",
            OBSERVATIONS, INGESTED_AT_COLUMN
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| self.decode_row(RowTable::Canonical, r).map(|s| s.record))
            .collect()
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let match_records: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", OBSERVATIONS))
            .fetch_one(&self.pool)
            .await?;
        let parked_records: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", PARKED_OBSERVATIONS))
                .fetch_one(&self.pool)
                .await?;
        let unique_teams: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT team_number) FROM {}",
            OBSERVATIONS
        ))
        .fetch_one(&self.pool)
        .await?;
        let conflict_groups = self.conflict_keys().await?.len() as i64;

        Ok(StoreStats {
            match_records,
            parked_records,
            unique_teams,
            conflict_groups,
        })
    }

    /// Take the reconciliation lock; `false` if someone else holds it
    pub async fn try_acquire_maintenance_lock(&self, holder: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO maintenance_lock (name, holder, acquired_at) VALUES (?, ?, ?)",
        )
        .bind(RECONCILIATION_LOCK)
        .bind(holder)
        .bind(format_timestamp(&now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Current lock holder and acquisition time
    pub async fn maintenance_lock_holder(&self) -> Result<Option<(String, String)>> {
        let row = sqlx::query("SELECT holder, acquired_at FROM maintenance_lock WHERE name = ?")
            .bind(RECONCILIATION_LOCK)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get("holder"), r.get("acquired_at"))))
    }

    pub async fn release_maintenance_lock(&self, holder: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM maintenance_lock WHERE name = ? AND holder = ?")
            .bind(RECONCILIATION_LOCK)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!("Maintenance lock was not held by {}", holder);
        }
        Ok(())
    }

    /// Clear a lock left behind by a crashed pass
    pub async fn force_release_maintenance_lock(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM maintenance_lock WHERE name = ?")
            .bind(RECONCILIATION_LOCK)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Columns written for a record, in schema order
    fn record_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = ids::RESERVED.into_iter().map(column_name).collect();
        columns.push(INGESTED_AT_COLUMN);
        columns.extend(self.schema.attribute_fields().map(|f| f.id.as_str()));
        columns
    }

    fn insert_sql(&self, table: &str) -> String {
        let columns = self.record_columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        )
    }

    /// Bind a record's values in `record_columns` order
    fn bind_record<'q>(
        &self,
        sql: &'q str,
        record: &ObservationRecord,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        let mut query = sqlx::query(sql)
            .bind(record.key.match_number as i64)
            .bind(record.key.team_number as i64)
            .bind(record.key.alliance.as_str())
            .bind(record.scouter_name.clone())
            .bind(record.submitted_at.clone())
            .bind(format_timestamp(&record.ingested_at));

        for field in self.schema.attribute_fields() {
            let value = record
                .attributes
                .get(&field.id)
                .cloned()
                .or_else(|| field.default_value());
            query = match value {
                Some(FieldValue::Integer(v)) => query.bind(v),
                Some(FieldValue::Boolean(v)) => query.bind(v),
                Some(FieldValue::Text(v)) => query.bind(v),
                None => query.bind(Option::<String>::None),
            };
        }

        query
    }

    fn decode_row(&self, table: RowTable, row: &SqliteRow) -> Result<StoredRecord> {
        let key = decode_key(row)?;

        let mut attributes = crate::record::FieldMap::new();
        for field in self.schema.attribute_fields() {
            let name = field.id.as_str();
            let value = match field.field_type {
                FieldType::Counter { .. } => row.try_get::<Option<i64>, _>(name)?.map(FieldValue::Integer),
                FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(FieldValue::Boolean),
                FieldType::Choice { .. } | FieldType::Text { .. } | FieldType::Timestamp => {
                    row.try_get::<Option<String>, _>(name)?.map(FieldValue::Text)
                }
            };
            let value = value.or_else(|| field.default_value()).ok_or_else(|| {
                Error::Internal(format!("Stored row has no value for '{}'", name))
            })?;
            attributes.insert(field.id.clone(), value);
        }

        let ingested_at: String = row.try_get(INGESTED_AT_COLUMN)?;

        Ok(StoredRecord {
            row: RowRef {
                table,
                id: row.try_get("id")?,
            },
            record: ObservationRecord {
                key,
                scouter_name: row.try_get("scouter_name")?,
                submitted_at: row.try_get(column_name(ids::SUBMITTED_AT))?,
                ingested_at: parse_timestamp(&ingested_at)?,
                attributes,
            },
        })
    }
}

fn decode_key(row: &SqliteRow) -> Result<IdentityKey> {
    let match_number: i64 = row.try_get("match_number")?;
    let team_number: i64 = row.try_get("team_number")?;
    let alliance: String = row.try_get("alliance")?;

    Ok(IdentityKey {
        match_number: u32::try_from(match_number)
            .map_err(|_| Error::Internal(format!("Stored match_number {} out of range", match_number)))?,
        team_number: u32::try_from(team_number)
            .map_err(|_| Error::Internal(format!("Stored team_number {} out of range", team_number)))?,
        alliance: alliance.parse::<Alliance>().map_err(Error::Internal)?,
    })
}
