//! Character table sync and column-filtered queries.
//!
//! `CharacterMB` rows arrive untyped from the master-data cache; they are
//! parsed into [`CharacterRow`] here, once, and everything downstream works
//! with the typed record.

use super::connection::MasterDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params_from_iter, types::Value};
use tokio_rusqlite::params;

/// Name of the remote master table holding character definitions.
pub const CHARACTER_TABLE: &str = "CharacterMB";

/// One untyped row as served by the remote `CharacterMB` table.
pub type RawCharacterRow = serde_json::Map<String, serde_json::Value>;

/// Rarity labels indexed by bit position in `RarityFlags`.
const RARITY_LABELS: [&str; 11] = ["N", "R", "R+", "SR", "SR+", "SSR", "SSR+", "UR", "UR+", "LR", "LR+"];

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCharacter {
    id: i64,
    name_key: String,
    #[serde(default)]
    name2_key: Option<String>,
    element_type: i64,
    job_flags: i64,
    rarity_flags: i64,
    initial_battle_parameter: RawBattleParameter,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBattleParameter {
    speed: i64,
}

/// A character as stored in the relational `characters` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CharacterRow {
    pub id: i64,
    /// String key of the character's display name.
    pub name_key: String,
    /// String key of the character's title, if the character has one.
    pub title_key: Option<String>,
    pub speed: i64,
    pub element: String,
    pub job: String,
    pub base_rarity: String,
}

/// Resolve the base rarity label from a `RarityFlags` bit-field.
///
/// The lowest set bit is the rarity the character is obtained at.
pub fn rarity_label(flags: i64) -> Option<&'static str> {
    if flags <= 0 {
        return None;
    }
    RARITY_LABELS.get(flags.trailing_zeros() as usize).copied()
}

fn element_label(element_type: i64) -> Option<&'static str> {
    match element_type {
        1 => Some("Azure"),
        2 => Some("Crimson"),
        3 => Some("Emerald"),
        4 => Some("Amber"),
        5 => Some("Radiance"),
        6 => Some("Chaos"),
        _ => None,
    }
}

fn job_label(job_flags: i64) -> Option<&'static str> {
    match job_flags {
        1 => Some("Warrior"),
        2 => Some("Sniper"),
        4 => Some("Sorcerer"),
        _ => None,
    }
}

impl CharacterRow {
    /// Parse one raw `CharacterMB` row.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` when a required field is missing or has the
    /// wrong type, or when an enum-like field carries an unknown value.
    pub fn parse(raw: &RawCharacterRow) -> Result<Self, Error> {
        let parsed: RawCharacter = serde_json::from_value(serde_json::Value::Object(raw.clone()))
            .map_err(|e| Error::ParseFailed(format!("{CHARACTER_TABLE}: {e}")))?;

        let element = element_label(parsed.element_type).ok_or_else(|| {
            Error::ParseFailed(format!("{CHARACTER_TABLE} id {}: unknown ElementType {}", parsed.id, parsed.element_type))
        })?;
        let job = job_label(parsed.job_flags).ok_or_else(|| {
            Error::ParseFailed(format!("{CHARACTER_TABLE} id {}: unknown JobFlags {}", parsed.id, parsed.job_flags))
        })?;
        let base_rarity = rarity_label(parsed.rarity_flags).ok_or_else(|| {
            Error::ParseFailed(format!("{CHARACTER_TABLE} id {}: unknown RarityFlags {}", parsed.id, parsed.rarity_flags))
        })?;

        Ok(Self {
            id: parsed.id,
            name_key: parsed.name_key,
            title_key: parsed.name2_key.filter(|k| !k.is_empty()),
            speed: parsed.initial_battle_parameter.speed,
            element: element.to_string(),
            job: job.to_string(),
            base_rarity: base_rarity.to_string(),
        })
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name_key: row.get(1)?,
            title_key: row.get(2)?,
            speed: row.get(3)?,
            element: row.get(4)?,
            job: row.get(5)?,
            base_rarity: row.get(6)?,
        })
    }
}

/// Columns a character query may filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CharacterColumn {
    Id,
    Speed,
    Element,
    Job,
    BaseRarity,
}

impl CharacterColumn {
    fn as_sql(self) -> &'static str {
        match self {
            CharacterColumn::Id => "id",
            CharacterColumn::Speed => "speed",
            CharacterColumn::Element => "element",
            CharacterColumn::Job => "job",
            CharacterColumn::BaseRarity => "base_rarity",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, CharacterColumn::Id | CharacterColumn::Speed)
    }
}

/// A filter operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum ColumnValue {
    Int(i64),
    Text(String),
}

impl ColumnValue {
    fn to_sql_value(&self) -> Value {
        match self {
            ColumnValue::Int(v) => Value::Integer(*v),
            ColumnValue::Text(v) => Value::Text(v.clone()),
        }
    }
}

/// Column-filtered character query.
///
/// Exactly one of `value` or the `min_value`/`max_value` range may be used.
/// A range may be open on either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CharacterQuery {
    pub column: CharacterColumn,
    #[serde(default)]
    pub value: Option<ColumnValue>,
    #[serde(default)]
    pub min_value: Option<ColumnValue>,
    #[serde(default)]
    pub max_value: Option<ColumnValue>,
}

impl CharacterQuery {
    /// Exact-match query.
    pub fn exact(column: CharacterColumn, value: ColumnValue) -> Self {
        Self { column, value: Some(value), min_value: None, max_value: None }
    }

    /// Range query; either bound may be omitted.
    pub fn range(column: CharacterColumn, min_value: Option<ColumnValue>, max_value: Option<ColumnValue>) -> Self {
        Self { column, value: None, min_value, max_value }
    }

    /// Reject malformed queries before touching the database.
    pub fn validate(&self) -> Result<(), Error> {
        let has_range = self.min_value.is_some() || self.max_value.is_some();
        match (&self.value, has_range) {
            (Some(_), true) => {
                return Err(Error::InvalidInput("value cannot be combined with min_value/max_value".into()));
            }
            (None, false) => {
                return Err(Error::InvalidInput("one of value or min_value/max_value is required".into()));
            }
            _ => {}
        }

        let numeric = self.column.is_numeric();
        for operand in [&self.value, &self.min_value, &self.max_value].into_iter().flatten() {
            let is_int = matches!(operand, ColumnValue::Int(_));
            if is_int != numeric {
                return Err(Error::InvalidInput(format!(
                    "column {} expects a {} operand",
                    self.column.as_sql(),
                    if numeric { "numeric" } else { "text" }
                )));
            }
        }

        Ok(())
    }

    fn to_sql(&self) -> (String, Vec<Value>) {
        let column = self.column.as_sql();
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(value) = &self.value {
            clauses.push(format!("{column} = ?"));
            values.push(value.to_sql_value());
        }
        if let Some(min) = &self.min_value {
            clauses.push(format!("{column} >= ?"));
            values.push(min.to_sql_value());
        }
        if let Some(max) = &self.max_value {
            clauses.push(format!("{column} <= ?"));
            values.push(max.to_sql_value());
        }

        let sql = format!(
            "SELECT id, name_key, title_key, speed, element, job, base_rarity
             FROM characters WHERE {} ORDER BY {column}, id",
            clauses.join(" AND ")
        );
        (sql, values)
    }
}

impl MasterDb {
    /// Upsert a batch of raw character rows.
    ///
    /// Returns the ids that did not exist before this call, ascending. The
    /// whole batch is parsed before any write; a parse failure aborts it.
    pub async fn upsert_characters(&self, rows: &[RawCharacterRow]) -> Result<Vec<i64>, Error> {
        let parsed = rows
            .iter()
            .map(CharacterRow::parse)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| tracing::warn!(error = %e, "character batch rejected"))?;

        let inserted = self
            .conn
            .call(move |conn| -> Result<Vec<i64>, Error> {
                let tx = conn.transaction()?;
                let mut inserted = Vec::new();
                {
                    let mut exists = tx.prepare_cached("SELECT EXISTS(SELECT 1 FROM characters WHERE id = ?1)")?;
                    let mut upsert = tx.prepare_cached(
                        "INSERT INTO characters (id, name_key, title_key, speed, element, job, base_rarity)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(id) DO UPDATE SET
                            name_key = excluded.name_key,
                            title_key = excluded.title_key,
                            speed = excluded.speed,
                            element = excluded.element,
                            job = excluded.job,
                            base_rarity = excluded.base_rarity",
                    )?;

                    for row in &parsed {
                        let existed: bool = exists.query_row(params![row.id], |r| r.get(0))?;
                        upsert.execute(params![
                            row.id,
                            &row.name_key,
                            &row.title_key,
                            row.speed,
                            &row.element,
                            &row.job,
                            &row.base_rarity,
                        ])?;
                        if !existed {
                            inserted.push(row.id);
                        }
                    }
                }
                tx.commit()?;

                inserted.sort_unstable();
                inserted.dedup();
                Ok(inserted)
            })
            .await
            .map_err(Error::from)?;

        tracing::info!(rows = rows.len(), inserted = inserted.len(), "characters upserted");
        Ok(inserted)
    }

    /// Get a character by id.
    pub async fn get_character(&self, id: i64) -> Result<Option<CharacterRow>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<CharacterRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT id, name_key, title_key, speed, element, job, base_rarity
                         FROM characters WHERE id = ?1",
                        params![id],
                        CharacterRow::from_sql,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)
    }

    /// Run a column-filtered query, ordered by the filtered column then id.
    pub async fn query_characters(&self, query: &CharacterQuery) -> Result<Vec<CharacterRow>, Error> {
        query.validate()?;
        let (sql, values) = query.to_sql();

        self.conn
            .call(move |conn| -> Result<Vec<CharacterRow>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(values.iter()), CharacterRow::from_sql)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }
}
