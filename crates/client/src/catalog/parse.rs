//! Body decoding for the master-data endpoints.

use std::collections::BTreeMap;

use masterbook_core::Error;
use serde::Deserialize;

use crate::source::{Catalog, CatalogEntry, Row, Version};

#[derive(Deserialize)]
struct CatalogBody {
    #[serde(rename = "MasterBookInfoMap")]
    master_book_info_map: BTreeMap<String, MasterBookInfo>,
}

#[derive(Deserialize)]
struct MasterBookInfo {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Decode a version body: a bare token or a JSON string literal.
pub fn parse_version(body: &[u8]) -> Result<Version, Error> {
    let text = std::str::from_utf8(body).map_err(|e| Error::MalformedBody(format!("version: {e}")))?;
    let text = text.trim();

    let token = if text.starts_with('"') {
        serde_json::from_str::<String>(text).map_err(|e| Error::MalformedBody(format!("version: {e}")))?
    } else {
        text.to_string()
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(Error::MalformedBody("version: empty token".into()));
    }
    Ok(Version::new(token))
}

/// Decode the catalog body. Extra per-table fields are ignored.
pub fn parse_catalog(body: &[u8]) -> Result<Catalog, Error> {
    let parsed: CatalogBody =
        serde_json::from_slice(body).map_err(|e| Error::MalformedBody(format!("catalog: {e}")))?;

    Ok(Catalog::from_entries(
        parsed
            .master_book_info_map
            .into_iter()
            .map(|(table_name, info)| CatalogEntry { table_name, content_hash: info.hash }),
    ))
}

/// Decode a table body into raw rows.
pub fn parse_table(name: &str, body: &[u8]) -> Result<Vec<Row>, Error> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedBody(format!("{name}: {e}")))
}
