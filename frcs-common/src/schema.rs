//! Field Schema Registry
//!
//! Single source of truth for every scouted field. The payload codec, the
//! ingestion pipeline, the record store's table layout and the conflict
//! resolution engine all read the same `FieldSchema`, so adding or removing a
//! field is a one-place change.
//!
//! The schema is loaded once at startup (built-in default or a TOML file) and
//! shared immutably afterwards.
//!
//! # TOML format
//!
//! ```toml
//! version = 2
//!
//! [[fields]]
//! id = "auto_balls_scored_upper"
//! type = "counter"
//! min = 0
//! max = 20
//! category = "autonomous"
//!
//! [[metrics]]
//! name = "teleop_accuracy"
//! made = ["teleop_balls_scored_upper"]
//! missed = ["teleop_balls_missed"]
//! ```

use crate::record::{FieldMap, FieldValue};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Reserved field ids carrying the identity key and provenance
pub mod ids {
    pub const SUBMITTED_AT: &str = "timestamp";
    pub const MATCH_NUMBER: &str = "match_number";
    pub const TEAM_NUMBER: &str = "team_number";
    pub const ALLIANCE: &str = "alliance";
    pub const SCOUTER_NAME: &str = "scouter_name";

    /// All reserved ids, in canonical column order
    pub const RESERVED: [&str; 5] = [MATCH_NUMBER, TEAM_NUMBER, ALLIANCE, SCOUTER_NAME, SUBMITTED_AT];
}

/// Declared type of a field, with its bounds or options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Integer counter within `[min, max]`
    Counter { min: i64, max: i64 },
    Boolean,
    /// One of a fixed list of strings
    Choice { options: Vec<String> },
    /// Free text, optionally length-limited (in characters)
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
    /// RFC 3339 timestamp, stored verbatim as text
    Timestamp,
}

impl FieldType {
    /// Whether the conflict engine averages this field
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Counter { .. })
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldType::Counter { .. } => "counter",
            FieldType::Boolean => "boolean",
            FieldType::Choice { .. } => "choice",
            FieldType::Text { .. } => "text",
            FieldType::Timestamp => "timestamp",
        }
    }
}

/// Form phase a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identity,
    Provenance,
    Autonomous,
    Teleoperated,
    Endgame,
    Performance,
    Notes,
}

/// One field of the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    pub category: Category,
    /// Value applied when an optional field is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, field_type: FieldType, category: Category) -> Self {
        Self {
            id: id.into(),
            field_type,
            required: false,
            category,
            default: None,
        }
    }

    pub fn counter(id: impl Into<String>, min: i64, max: i64, category: Category) -> Self {
        Self::new(id, FieldType::Counter { min, max }, category)
    }

    pub fn boolean(id: impl Into<String>, category: Category) -> Self {
        Self::new(id, FieldType::Boolean, category)
    }

    pub fn choice(id: impl Into<String>, options: &[&str], category: Category) -> Self {
        let options = options.iter().map(|o| o.to_string()).collect();
        Self::new(id, FieldType::Choice { options }, category)
    }

    pub fn text(id: impl Into<String>, max_len: Option<usize>, category: Category) -> Self {
        Self::new(id, FieldType::Text { max_len }, category)
    }

    pub fn timestamp(id: impl Into<String>, category: Category) -> Self {
        Self::new(id, FieldType::Timestamp, category)
    }

    /// Mark field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the value used when the field is omitted
    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Identity and provenance fields are held outside the attribute map
    pub fn is_reserved(&self) -> bool {
        matches!(self.category, Category::Identity | Category::Provenance)
    }

    /// Value used for an omitted optional field
    ///
    /// Explicit default first, then the type-implied one. Timestamps have no
    /// implied default.
    pub fn default_value(&self) -> Option<FieldValue> {
        if let Some(value) = &self.default {
            return Some(value.clone());
        }
        match &self.field_type {
            FieldType::Counter { min, max } => Some(FieldValue::Integer(0.clamp(*min, *max))),
            FieldType::Boolean => Some(FieldValue::Boolean(false)),
            FieldType::Choice { options } => options.first().cloned().map(FieldValue::Text),
            FieldType::Text { .. } => Some(FieldValue::Text(String::new())),
            FieldType::Timestamp => None,
        }
    }

    /// Check a typed value against this field's type, bounds and options
    pub fn check(&self, value: &FieldValue) -> std::result::Result<(), String> {
        match (&self.field_type, value) {
            (FieldType::Counter { min, max }, FieldValue::Integer(v)) => {
                if v < min || v > max {
                    Err(format!("{} is outside {}..={}", v, min, max))
                } else {
                    Ok(())
                }
            }
            (FieldType::Boolean, FieldValue::Boolean(_)) => Ok(()),
            (FieldType::Choice { options }, FieldValue::Text(s)) => {
                if options.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of [{}]", s, options.join(", ")))
                }
            }
            (FieldType::Text { max_len }, FieldValue::Text(s)) => match max_len {
                Some(limit) if s.chars().count() > *limit => {
                    Err(format!("text longer than {} characters", limit))
                }
                _ => Ok(()),
            },
            (FieldType::Timestamp, FieldValue::Text(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .map_err(|e| format!("'{}' is not an RFC 3339 timestamp: {}", s, e)),
            (expected, actual) => Err(format!(
                "expected {}, got {}",
                expected.type_name(),
                actual.type_name()
            )),
        }
    }
}

/// Made/missed percentage exposed by the derived accuracy view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyMetric {
    pub name: String,
    pub made: Vec<String>,
    pub missed: Vec<String>,
}

/// One problem found while validating a field map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    Missing(String),
    Unknown(String),
    Invalid { field: String, reason: String },
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing(id) => write!(f, "missing required field '{}'", id),
            FieldIssue::Unknown(id) => write!(f, "unknown field '{}'", id),
            FieldIssue::Invalid { field, reason } => write!(f, "invalid '{}': {}", field, reason),
        }
    }
}

/// Field map failed schema validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

/// Versioned, ordered set of field descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub version: u32,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub metrics: Vec<AccuracyMetric>,
}

impl FieldSchema {
    /// Build and validate a schema
    pub fn new(version: u32, fields: Vec<FieldDescriptor>, metrics: Vec<AccuracyMetric>) -> Result<Self> {
        let schema = Self { version, fields, metrics };
        schema.validate_definition()?;
        Ok(schema)
    }

    /// Parse a schema from TOML and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let schema: FieldSchema = toml::from_str(content)
            .map_err(|e| Error::Schema(format!("Failed to parse schema TOML: {}", e)))?;
        schema.validate_definition()?;
        Ok(schema)
    }

    /// Load a schema file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The match-scouting form shipped with the system (version 1)
    pub fn builtin() -> Self {
        use Category::*;

        let fields = vec![
            FieldDescriptor::timestamp(ids::SUBMITTED_AT, Provenance).required(),
            FieldDescriptor::counter(ids::MATCH_NUMBER, 1, 999, Identity).required(),
            FieldDescriptor::counter(ids::TEAM_NUMBER, 1, 99_999, Identity).required(),
            FieldDescriptor::choice(ids::ALLIANCE, &["Red", "Blue"], Identity).required(),
            FieldDescriptor::text(ids::SCOUTER_NAME, Some(64), Provenance).required(),
            // Autonomous
            FieldDescriptor::counter("auto_balls_scored_upper", 0, 20, Autonomous),
            FieldDescriptor::counter("auto_balls_scored_lower", 0, 20, Autonomous),
            FieldDescriptor::boolean("auto_taxi", Autonomous),
            // Teleoperated
            FieldDescriptor::counter("teleop_balls_scored_upper", 0, 100, Teleoperated),
            FieldDescriptor::counter("teleop_balls_scored_lower", 0, 100, Teleoperated),
            FieldDescriptor::counter("teleop_balls_missed", 0, 100, Teleoperated),
            // Endgame
            FieldDescriptor::choice(
                "climb_level",
                &["", "None", "Low", "Mid", "High", "Traversal"],
                Endgame,
            ),
            FieldDescriptor::counter("climb_time", 0, 150, Endgame),
            // Performance assessment
            FieldDescriptor::choice(
                "defense_rating",
                &["", "None", "Poor", "Average", "Good", "Excellent"],
                Performance,
            ),
            FieldDescriptor::choice(
                "driver_skill",
                &["", "Poor", "Average", "Good", "Excellent"],
                Performance,
            ),
            FieldDescriptor::counter("penalties", 0, 50, Performance),
            FieldDescriptor::boolean("broke_down", Performance),
            FieldDescriptor::text("notes", Some(500), Notes),
        ];

        let metrics = vec![AccuracyMetric {
            name: "teleop_accuracy".to_string(),
            made: vec![
                "teleop_balls_scored_upper".to_string(),
                "teleop_balls_scored_lower".to_string(),
            ],
            missed: vec!["teleop_balls_missed".to_string()],
        }];

        Self {
            version: 1,
            fields,
            metrics,
        }
    }

    /// Check the schema definition itself
    pub fn validate_definition(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_sql_identifier(&field.id) {
                return Err(Error::Schema(format!(
                    "Field id '{}' must match [a-z][a-z0-9_]*",
                    field.id
                )));
            }
            if FIXED_COLUMNS.contains(&field.id.as_str()) {
                return Err(Error::Schema(format!(
                    "Field id '{}' collides with a fixed store column",
                    field.id
                )));
            }
            if is_sql_keyword(&field.id) {
                return Err(Error::Schema(format!(
                    "Field id '{}' is an SQL keyword",
                    field.id
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(Error::Schema(format!("Duplicate field id '{}'", field.id)));
            }
            if let FieldType::Counter { min, max } = field.field_type {
                if min > max {
                    return Err(Error::Schema(format!(
                        "Field '{}' has min {} > max {}",
                        field.id, min, max
                    )));
                }
            }
            if let FieldType::Choice { options } = &field.field_type {
                if options.is_empty() {
                    return Err(Error::Schema(format!("Choice field '{}' has no options", field.id)));
                }
            }
            if let Some(default) = &field.default {
                field.check(default).map_err(|reason| {
                    Error::Schema(format!("Default for '{}' is invalid: {}", field.id, reason))
                })?;
            }
            if !field.required && field.default_value().is_none() {
                return Err(Error::Schema(format!(
                    "Optional field '{}' needs a default value",
                    field.id
                )));
            }
            let reserved = ids::RESERVED.contains(&field.id.as_str());
            if reserved != field.is_reserved() {
                return Err(Error::Schema(format!(
                    "Field '{}' has category {:?}; identity/provenance categories are reserved for [{}]",
                    field.id,
                    field.category,
                    ids::RESERVED.join(", ")
                )));
            }
        }

        self.validate_reserved()?;

        for metric in &self.metrics {
            if !is_sql_identifier(&metric.name) {
                return Err(Error::Schema(format!("Metric name '{}' is not a valid identifier", metric.name)));
            }
            if metric.made.is_empty() {
                return Err(Error::Schema(format!("Metric '{}' has no 'made' fields", metric.name)));
            }
            for id in metric.made.iter().chain(metric.missed.iter()) {
                match self.field(id) {
                    Some(f) if f.field_type.is_numeric() && !f.is_reserved() => {}
                    _ => {
                        return Err(Error::Schema(format!(
                            "Metric '{}' references '{}', which is not a counter field",
                            metric.name, id
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_reserved(&self) -> Result<()> {
        let require = |id: &str| {
            self.field(id)
                .filter(|f| f.required)
                .ok_or_else(|| Error::Schema(format!("Schema must declare required field '{}'", id)))
        };

        for id in [ids::MATCH_NUMBER, ids::TEAM_NUMBER] {
            match require(id)?.field_type {
                FieldType::Counter { min, .. } if min >= 1 => {}
                _ => {
                    return Err(Error::Schema(format!(
                        "'{}' must be a counter with min >= 1",
                        id
                    )))
                }
            }
        }

        match &require(ids::ALLIANCE)?.field_type {
            FieldType::Choice { options } if options == &["Red", "Blue"] => {}
            _ => {
                return Err(Error::Schema(
                    "'alliance' must be a choice of exactly [Red, Blue]".to_string(),
                ))
            }
        }

        if !matches!(require(ids::SCOUTER_NAME)?.field_type, FieldType::Text { .. }) {
            return Err(Error::Schema("'scouter_name' must be a text field".to_string()));
        }
        if require(ids::SUBMITTED_AT)?.field_type != FieldType::Timestamp {
            return Err(Error::Schema("'timestamp' must be a timestamp field".to_string()));
        }

        Ok(())
    }

    /// Look up a field descriptor by id
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Non-reserved fields (phase attributes), in declaration order
    pub fn attribute_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_reserved())
    }

    /// Validate a field map: no unknown keys, required fields present, every
    /// value satisfies its declared type. Reports every issue found.
    pub fn validate(&self, map: &FieldMap) -> std::result::Result<(), ValidationError> {
        let mut issues = Vec::new();

        for key in map.keys() {
            if self.field(key).is_none() {
                issues.push(FieldIssue::Unknown(key.clone()));
            }
        }

        for field in &self.fields {
            match map.get(&field.id) {
                Some(value) => {
                    if let Err(reason) = field.check(value) {
                        issues.push(FieldIssue::Invalid {
                            field: field.id.clone(),
                            reason,
                        });
                    }
                }
                None if field.required => issues.push(FieldIssue::Missing(field.id.clone())),
                None => {}
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Fill every omitted optional field with its default
    pub fn with_defaults(&self, mut map: FieldMap) -> FieldMap {
        for field in &self.fields {
            if !map.contains_key(&field.id) {
                if let Some(default) = field.default_value() {
                    map.insert(field.id.clone(), default);
                }
            }
        }
        map
    }
}

/// Store columns that no field may claim
const FIXED_COLUMNS: [&str; 3] = ["id", "submitted_at", "ingested_at"];

/// SQLite keywords; these need quoting as column names, which the store never does
const SQL_KEYWORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "always", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current", "current_date", "current_time", "current_timestamp", "database", "default",
    "deferrable", "deferred", "delete", "desc", "detach", "distinct", "do", "drop", "each",
    "else", "end", "escape", "except", "exclude", "exclusive", "exists", "explain", "fail",
    "filter", "first", "following", "for", "foreign", "from", "full", "generated", "glob",
    "group", "groups", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "last", "left", "like", "limit", "match", "materialized", "natural", "no", "not",
    "nothing", "notnull", "null", "nulls", "of", "offset", "on", "or", "order", "others",
    "outer", "over", "partition", "plan", "pragma", "preceding", "primary", "query", "raise",
    "range", "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "returning", "right", "rollback", "row", "rows", "savepoint", "select", "set",
    "table", "temp", "temporary", "then", "ties", "to", "transaction", "trigger", "unbounded",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when",
    "where", "window", "with", "without",
];

fn is_sql_keyword(name: &str) -> bool {
    SQL_KEYWORDS.contains(&name)
}

/// Field ids become column names, so they are restricted to plain identifiers
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() < 64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_map() -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("timestamp".into(), FieldValue::Text("2024-03-02T10:15:00Z".into()));
        map.insert("match_number".into(), FieldValue::Integer(12));
        map.insert("team_number".into(), FieldValue::Integer(254));
        map.insert("alliance".into(), FieldValue::Text("Red".into()));
        map.insert("scouter_name".into(), FieldValue::Text("Ada".into()));
        map
    }

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = FieldSchema::builtin();
        schema.validate_definition().unwrap();
        assert_eq!(schema.fields.len(), 18);
        assert_eq!(schema.attribute_fields().count(), 13);
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let mut schema = FieldSchema::builtin();
        schema
            .fields
            .push(FieldDescriptor::boolean("auto_taxi", Category::Autonomous));
        let err = schema.validate_definition().unwrap_err();
        assert!(err.to_string().contains("Duplicate field id 'auto_taxi'"));
    }

    #[test]
    fn test_unsafe_field_id_rejected() {
        let mut schema = FieldSchema::builtin();
        schema
            .fields
            .push(FieldDescriptor::boolean("x; DROP TABLE observations", Category::Notes));
        assert!(schema.validate_definition().is_err());
    }

    #[test]
    fn test_column_clashing_field_ids_rejected() {
        for (id, message) in [
            ("ingested_at", "fixed store column"),
            ("submitted_at", "fixed store column"),
            ("id", "fixed store column"),
            ("order", "SQL keyword"),
            ("group", "SQL keyword"),
        ] {
            let mut schema = FieldSchema::builtin();
            schema.fields.push(FieldDescriptor::boolean(id, Category::Notes));
            let err = schema.validate_definition().unwrap_err();
            assert!(err.to_string().contains(message), "{}: {}", id, err);
        }
    }

    #[test]
    fn test_missing_identity_field_rejected() {
        let mut schema = FieldSchema::builtin();
        schema.fields.retain(|f| f.id != ids::ALLIANCE);
        let err = schema.validate_definition().unwrap_err();
        assert!(err.to_string().contains("alliance"));
    }

    #[test]
    fn test_reserved_category_misuse_rejected() {
        let mut schema = FieldSchema::builtin();
        schema
            .fields
            .push(FieldDescriptor::counter("robot_speed", 0, 10, Category::Identity));
        assert!(schema.validate_definition().is_err());
    }

    #[test]
    fn test_metric_must_reference_counters() {
        let mut schema = FieldSchema::builtin();
        schema.metrics.push(AccuracyMetric {
            name: "bad".into(),
            made: vec!["notes".into()],
            missed: vec![],
        });
        assert!(schema.validate_definition().is_err());
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let schema = FieldSchema::builtin();
        let mut map = valid_map();
        map.remove("scouter_name");
        map.insert("auto_balls_scored_upper".into(), FieldValue::Integer(99));
        map.insert("cargo_bay".into(), FieldValue::Integer(1));

        let err = schema.validate(&map).unwrap_err();
        assert_eq!(err.issues.len(), 3);
        assert!(err.issues.contains(&FieldIssue::Missing("scouter_name".into())));
        assert!(err.issues.contains(&FieldIssue::Unknown("cargo_bay".into())));
        assert!(err.to_string().contains("auto_balls_scored_upper"));
    }

    #[test]
    fn test_validate_rejects_bad_choice_and_timestamp() {
        let schema = FieldSchema::builtin();
        let mut map = valid_map();
        map.insert("alliance".into(), FieldValue::Text("Green".into()));
        map.insert("timestamp".into(), FieldValue::Text("yesterday".into()));
        let err = schema.validate(&map).unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_with_defaults_fills_every_optional_field() {
        let schema = FieldSchema::builtin();
        let map = schema.with_defaults(valid_map());
        assert_eq!(map.len(), schema.fields.len());
        assert_eq!(map["auto_taxi"], FieldValue::Boolean(false));
        assert_eq!(map["climb_level"], FieldValue::Text(String::new()));
        assert_eq!(map["penalties"], FieldValue::Integer(0));
        schema.validate(&map).unwrap();
    }

    #[test]
    fn test_schema_from_toml() {
        let toml = r#"
            version = 2

            [[fields]]
            id = "timestamp"
            type = "timestamp"
            required = true
            category = "provenance"

            [[fields]]
            id = "match_number"
            type = "counter"
            min = 1
            max = 200
            required = true
            category = "identity"

            [[fields]]
            id = "team_number"
            type = "counter"
            min = 1
            max = 9999
            required = true
            category = "identity"

            [[fields]]
            id = "alliance"
            type = "choice"
            options = ["Red", "Blue"]
            required = true
            category = "identity"

            [[fields]]
            id = "scouter_name"
            type = "text"
            required = true
            category = "provenance"

            [[fields]]
            id = "amp_notes"
            type = "counter"
            min = 0
            max = 40
            default = 0
            category = "teleoperated"

            [[fields]]
            id = "harmony"
            type = "boolean"
            default = false
            category = "endgame"
        "#;

        let schema = FieldSchema::from_toml_str(toml).unwrap();
        assert_eq!(schema.version, 2);
        assert_eq!(schema.attribute_fields().count(), 2);
        assert_eq!(
            schema.field("amp_notes").unwrap().field_type,
            FieldType::Counter { min: 0, max: 40 }
        );
        assert_eq!(
            schema.field("scouter_name").unwrap().field_type,
            FieldType::Text { max_len: None }
        );
    }

    #[test]
    fn test_invalid_default_rejected() {
        let mut schema = FieldSchema::builtin();
        schema.fields.push(
            FieldDescriptor::counter("fouls", 0, 5, Category::Performance)
                .with_default(FieldValue::Integer(9)),
        );
        assert!(schema.validate_definition().is_err());
    }
}
