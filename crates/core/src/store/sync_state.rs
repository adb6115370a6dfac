//! Catalog hash each master table was last written to the store at.
//!
//! A table's hash is recorded only after its writes commit, so a table whose
//! sync failed still differs from the catalog on the next cycle.

use super::connection::MasterDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

impl MasterDb {
    /// Hash `table` was last synced at, if it was ever synced.
    pub async fn synced_hash(&self, table: &str) -> Result<Option<String>, Error> {
        let table = table.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                Ok(conn
                    .query_row(
                        "SELECT content_hash FROM synced_tables WHERE table_name = ?1",
                        params![table],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Record that `table` is synced at `hash`.
    pub async fn record_synced(&self, table: &str, hash: &str) -> Result<(), Error> {
        let (table_owned, hash_owned) = (table.to_string(), hash.to_string());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO synced_tables (table_name, content_hash, synced_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(table_name) DO UPDATE SET
                        content_hash = excluded.content_hash,
                        synced_at = excluded.synced_at",
                    params![table_owned, hash_owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(table, hash, "table sync recorded");
        Ok(())
    }
}
