//! Observation records and their identity key

use crate::schema::{ids, FieldIssue, FieldSchema, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field id → value. Ordered so that every traversal (and therefore the
/// payload encoding) is deterministic.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single scouted value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Text(s) if s.is_empty() => write!(f, "\"\""),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alliance::Red => "Red",
            Alliance::Blue => "Blue",
        }
    }
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alliance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Red" => Ok(Alliance::Red),
            "Blue" => Ok(Alliance::Blue),
            other => Err(format!("Alliance must be 'Red' or 'Blue', got '{}'", other)),
        }
    }
}

/// `(match, team, alliance)`: unique among canonical records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub match_number: u32,
    pub team_number: u32,
    pub alliance: Alliance,
}

impl IdentityKey {
    pub fn new(match_number: u32, team_number: u32, alliance: Alliance) -> Self {
        Self {
            match_number,
            team_number,
            alliance,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Match {}, Team {}, {}",
            self.match_number, self.team_number, self.alliance
        )
    }
}

/// One complete scouting observation
///
/// Always fully populated: `attributes` holds exactly the schema's
/// non-reserved fields (defaults applied), identity and provenance live in
/// their own typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub key: IdentityKey,
    pub scouter_name: String,
    /// Client-side submission time, RFC 3339 text as the scout's device sent it
    pub submitted_at: String,
    /// Server-side commit time
    pub ingested_at: DateTime<Utc>,
    pub attributes: FieldMap,
}

impl ObservationRecord {
    /// Build a record from a decoded field map
    ///
    /// Validates against the schema, applies defaults, and splits out the
    /// identity key and provenance.
    pub fn from_fields(
        schema: &FieldSchema,
        fields: FieldMap,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        schema.validate(&fields)?;
        let mut fields = schema.with_defaults(fields);

        let key = IdentityKey {
            match_number: take_positive(&mut fields, ids::MATCH_NUMBER)?,
            team_number: take_positive(&mut fields, ids::TEAM_NUMBER)?,
            alliance: take_text(&mut fields, ids::ALLIANCE)?
                .parse()
                .map_err(|reason| invalid(ids::ALLIANCE, reason))?,
        };
        let scouter_name = take_text(&mut fields, ids::SCOUTER_NAME)?;
        if scouter_name.trim().is_empty() {
            return Err(invalid(ids::SCOUTER_NAME, "must not be blank".to_string()));
        }
        let submitted_at = take_text(&mut fields, ids::SUBMITTED_AT)?;

        Ok(Self {
            key,
            scouter_name,
            submitted_at,
            ingested_at,
            attributes: fields,
        })
    }

    /// Full field map (reserved fields included), as carried in a payload
    pub fn to_field_map(&self) -> FieldMap {
        let mut map = self.attributes.clone();
        map.insert(
            ids::MATCH_NUMBER.to_string(),
            FieldValue::Integer(self.key.match_number as i64),
        );
        map.insert(
            ids::TEAM_NUMBER.to_string(),
            FieldValue::Integer(self.key.team_number as i64),
        );
        map.insert(
            ids::ALLIANCE.to_string(),
            FieldValue::Text(self.key.alliance.as_str().to_string()),
        );
        map.insert(
            ids::SCOUTER_NAME.to_string(),
            FieldValue::Text(self.scouter_name.clone()),
        );
        map.insert(
            ids::SUBMITTED_AT.to_string(),
            FieldValue::Text(self.submitted_at.clone()),
        );
        map
    }

    /// SHA-256 of the canonical encoding; `ingested_at` is not part of it
    ///
    /// Two records with equal fingerprints are identical submissions.
    pub fn fingerprint(&self) -> String {
        crate::codec::fingerprint(&self.to_field_map())
    }

    /// Short display form: `Match {n}, Team {t}`
    pub fn summary(&self) -> String {
        format!("Match {}, Team {}", self.key.match_number, self.key.team_number)
    }
}

fn invalid(field: &str, reason: String) -> ValidationError {
    ValidationError {
        issues: vec![FieldIssue::Invalid {
            field: field.to_string(),
            reason,
        }],
    }
}

fn take_positive(fields: &mut FieldMap, id: &str) -> Result<u32, ValidationError> {
    match fields.remove(id) {
        Some(FieldValue::Integer(v)) if v >= 1 => {
            u32::try_from(v).map_err(|_| invalid(id, format!("{} is too large", v)))
        }
        Some(other) => Err(invalid(id, format!("must be a positive integer, got {}", other))),
        None => Err(ValidationError {
            issues: vec![FieldIssue::Missing(id.to_string())],
        }),
    }
}

fn take_text(fields: &mut FieldMap, id: &str) -> Result<String, ValidationError> {
    match fields.remove(id) {
        Some(FieldValue::Text(s)) => Ok(s),
        Some(other) => Err(invalid(id, format!("must be text, got {}", other))),
        None => Err(ValidationError {
            issues: vec![FieldIssue::Missing(id.to_string())],
        }),
    }
}
