//! cache_status tool implementation.
//!
//! Reports what the in-process table cache currently holds.

use masterbook_client::TableCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// Installed master-data version; absent before the first load.
    pub version: Option<String>,
    /// Number of tables listed in the installed catalog.
    pub catalog_tables: usize,
    /// Names of tables whose rows are cached, sorted.
    pub cached_tables: Vec<String>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(cache: &TableCache) -> Result<CallToolResult, McpError> {
    let output = CacheStatusOutput {
        version: cache.version().await.map(|v| v.to_string()),
        catalog_tables: cache.catalog().await.len(),
        cached_tables: cache.cached_tables().await,
    };
    json_result(&output)
}
