//! Alias seeding and alt-group resolution.
//!
//! Characters that share a canonical display name are costume variants of one
//! another and form an alt-group keyed by the lowest id in the group. Every
//! character gets searchable aliases derived from its localized name and title.

use std::collections::BTreeMap;

use super::connection::MasterDb;
use crate::{Error, Lang};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, OptionalExtension};

/// A searchable handle mapped to a character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AliasRecord {
    pub char_id: i64,
    /// Normalized alias text; globally unique.
    pub alias: String,
    pub is_custom: bool,
}

/// Alt-group membership of one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AltGroup {
    pub char_id: i64,
    pub base_id: i64,
    /// Group size at the time this character joined.
    pub serial: i64,
}

/// Case- and punctuation-insensitive form used for alias keys and name matching.
pub fn normalize_alias(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn localized_texts(conn: &Connection, key: &str) -> rusqlite::Result<Vec<(Lang, Option<String>)>> {
    let columns: Vec<&str> = Lang::ALL.iter().map(|lang| lang.column()).collect();
    let sql = format!("SELECT {} FROM strings WHERE key = ?1", columns.join(", "));

    let texts = conn
        .query_row(&sql, params![key], |row| {
            Lang::ALL
                .iter()
                .enumerate()
                .map(|(i, lang)| Ok((*lang, row.get::<_, Option<String>>(i)?)))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .optional()?;

    Ok(texts.unwrap_or_else(|| Lang::ALL.iter().map(|lang| (*lang, None)).collect()))
}

fn primary_text(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    let sql = format!("SELECT {} FROM strings WHERE key = ?1", Lang::PRIMARY.column());
    Ok(conn
        .query_row(&sql, params![key], |row| row.get::<_, Option<String>>(0))
        .optional()?
        .flatten())
}

fn load_alt_group(conn: &Connection, char_id: i64) -> rusqlite::Result<Option<AltGroup>> {
    conn.query_row(
        "SELECT char_id, base_id, serial FROM alt_groups WHERE char_id = ?1",
        params![char_id],
        |row| Ok(AltGroup { char_id: row.get(0)?, base_id: row.get(1)?, serial: row.get(2)? }),
    )
    .optional()
}

fn group_size(conn: &Connection, base_id: i64, excluding: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM alt_groups WHERE base_id = ?1 AND char_id != ?2",
        params![base_id, excluding],
        |row| row.get(0),
    )
}

/// Make sure a base that was never seeded is counted as a member of its group.
fn ensure_base_row(conn: &Connection, base_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO alt_groups (char_id, base_id, serial) VALUES (?1, ?1, 0)
         ON CONFLICT(char_id) DO NOTHING",
        params![base_id],
    )?;
    Ok(())
}

fn character_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM characters WHERE id = ?1)", params![id], |row| row.get(0))
}

/// Find the alt-group base for a character from lower-id name matches.
fn resolve_base(conn: &Connection, char_id: i64, canonical: &str) -> Result<i64, Error> {
    let sql = format!(
        "SELECT c.id, s.{} FROM characters c JOIN strings s ON s.key = c.name_key
         WHERE c.id < ?1 ORDER BY c.id",
        Lang::PRIMARY.column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![char_id])?;

    while let Some(row) = rows.next()? {
        let name: Option<String> = row.get(1)?;
        if name.is_some_and(|n| normalize_alias(&n) == canonical) {
            let matched: i64 = row.get(0)?;
            let base = load_alt_group(conn, matched)?.map_or(matched, |group| group.base_id);
            return Ok(base);
        }
    }

    Ok(char_id)
}

fn insert_alias(conn: &Connection, char_id: i64, alias: &str, is_custom: bool) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT INTO aliases (alias, char_id, is_custom) VALUES (?1, ?2, ?3)
         ON CONFLICT(alias) DO NOTHING",
        params![alias, char_id, is_custom],
    )?;
    Ok(changed > 0)
}

fn alias_owner(conn: &Connection, alias: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT char_id FROM aliases WHERE alias = ?1", params![alias], |row| row.get(0))
        .optional()
}

impl MasterDb {
    /// Seed default aliases for a character, joining it to its alt-group.
    ///
    /// Returns the generated aliases that now belong to `char_id`. Aliases
    /// already taken by another character are skipped silently, as are
    /// languages with no localized name.
    pub async fn seed_aliases(&self, char_id: i64) -> Result<Vec<AliasRecord>, Error> {
        let records = self
            .conn
            .call(move |conn| -> Result<Vec<AliasRecord>, Error> {
                let tx = conn.transaction()?;

                let keys: Option<(String, Option<String>)> = tx
                    .query_row(
                        "SELECT name_key, title_key FROM characters WHERE id = ?1",
                        params![char_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let Some((name_key, title_key)) = keys else {
                    return Err(Error::InvalidInput(format!("unknown character id {char_id}")));
                };

                let group = match load_alt_group(&tx, char_id)? {
                    Some(group) => group,
                    None => {
                        let canonical = primary_text(&tx, &name_key)?
                            .map(|name| normalize_alias(&name))
                            .unwrap_or_default();
                        let base_id =
                            if canonical.is_empty() { char_id } else { resolve_base(&tx, char_id, &canonical)? };
                        if base_id != char_id {
                            ensure_base_row(&tx, base_id)?;
                        }
                        let serial = group_size(&tx, base_id, char_id)?;
                        tx.execute(
                            "INSERT INTO alt_groups (char_id, base_id, serial) VALUES (?1, ?2, ?3)",
                            params![char_id, base_id, serial],
                        )?;
                        AltGroup { char_id, base_id, serial }
                    }
                };

                let mut candidates = BTreeMap::new();
                for (lang, name) in localized_texts(&tx, &name_key)? {
                    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
                        tracing::debug!(char_id, lang = lang.column(), "no localized name; skipping");
                        continue;
                    };
                    let name = if group.serial > 1 { format!("{name}{}", group.serial) } else { name };
                    candidates.insert(normalize_alias(&name), lang);
                }
                if let Some(title_key) = &title_key {
                    for (_, title) in localized_texts(&tx, title_key)? {
                        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
                            candidates.entry(normalize_alias(&title)).or_insert(Lang::PRIMARY);
                        }
                    }
                }

                let mut records = Vec::new();
                for alias in candidates.into_keys().filter(|a| !a.is_empty()) {
                    insert_alias(&tx, char_id, &alias, false)?;
                    if alias_owner(&tx, &alias)? == Some(char_id) {
                        records.push(AliasRecord { char_id, alias, is_custom: false });
                    }
                }

                tx.commit()?;
                Ok(records)
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(char_id, aliases = records.len(), "aliases seeded");
        Ok(records)
    }

    /// Add a user-supplied alias.
    ///
    /// Returns `false` when the alias already exists (for any character).
    pub async fn add_custom_alias(&self, char_id: i64, text: &str) -> Result<bool, Error> {
        let alias = normalize_alias(text);
        if alias.is_empty() {
            return Err(Error::InvalidInput("alias must contain at least one letter or digit".into()));
        }

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                if !character_exists(conn, char_id)? {
                    return Err(Error::InvalidInput(format!("unknown character id {char_id}")));
                }
                Ok(insert_alias(conn, char_id, &alias, true)?)
            })
            .await
            .map_err(Error::from)
    }

    /// Resolve free text to a character id through the alias table.
    pub async fn resolve_alias(&self, text: &str) -> Result<Option<i64>, Error> {
        let alias = normalize_alias(text);
        self.conn
            .call(move |conn| -> Result<Option<i64>, Error> { Ok(alias_owner(conn, &alias)?) })
            .await
            .map_err(Error::from)
    }

    /// All aliases belonging to a character, ordered by alias text.
    pub async fn aliases_for(&self, char_id: i64) -> Result<Vec<AliasRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<AliasRecord>, Error> {
                let mut stmt =
                    conn.prepare("SELECT char_id, alias, is_custom FROM aliases WHERE char_id = ?1 ORDER BY alias")?;
                let rows = stmt.query_map(params![char_id], |row| {
                    Ok(AliasRecord { char_id: row.get(0)?, alias: row.get(1)?, is_custom: row.get(2)? })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Alt-group membership of a character, if it has been seeded or assigned.
    pub async fn alt_group(&self, char_id: i64) -> Result<Option<AltGroup>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<AltGroup>, Error> { Ok(load_alt_group(conn, char_id)?) })
            .await
            .map_err(Error::from)
    }

    /// Characters that have never joined an alt-group, ascending.
    ///
    /// Seeding always records group membership, so these are the characters
    /// whose default aliases were never generated.
    pub async fn unseeded_characters(&self) -> Result<Vec<i64>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<i64>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.id FROM characters c LEFT JOIN alt_groups g ON g.char_id = c.id
                     WHERE g.char_id IS NULL ORDER BY c.id",
                )?;
                let ids = stmt.query_map([], |row| row.get(0))?;
                Ok(ids.collect::<Result<Vec<i64>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Manually place a character into the alt-group rooted at `base_id`.
    ///
    /// The base must be the lowest id of its group and must itself be a base;
    /// a character that currently roots other members cannot be moved under a
    /// different base. Either violation would leave a chain or cycle.
    pub async fn assign_alt_base(&self, char_id: i64, base_id: i64) -> Result<AltGroup, Error> {
        if base_id > char_id {
            return Err(Error::InvalidInput(format!("base id {base_id} must not exceed character id {char_id}")));
        }

        self.conn
            .call(move |conn| -> Result<AltGroup, Error> {
                let tx = conn.transaction()?;

                for id in [char_id, base_id] {
                    if !character_exists(&tx, id)? {
                        return Err(Error::InvalidInput(format!("unknown character id {id}")));
                    }
                }

                if let Some(base_group) = load_alt_group(&tx, base_id)?
                    && base_group.base_id != base_id
                {
                    return Err(Error::InvalidInput(format!(
                        "character {base_id} belongs to the group of {}",
                        base_group.base_id
                    )));
                }
                if base_id != char_id && group_size(&tx, char_id, char_id)? > 0 {
                    return Err(Error::InvalidInput(format!("character {char_id} is the base of other characters")));
                }

                let serial = if base_id == char_id {
                    0
                } else {
                    ensure_base_row(&tx, base_id)?;
                    group_size(&tx, base_id, char_id)?
                };
                tx.execute(
                    "INSERT INTO alt_groups (char_id, base_id, serial) VALUES (?1, ?2, ?3)
                     ON CONFLICT(char_id) DO UPDATE SET base_id = excluded.base_id, serial = excluded.serial",
                    params![char_id, base_id, serial],
                )?;

                tx.commit()?;
                Ok(AltGroup { char_id, base_id, serial })
            })
            .await
            .map_err(Error::from)
    }
}
