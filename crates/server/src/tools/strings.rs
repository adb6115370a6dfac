//! string_diff_log tool implementation.
//!
//! Reads the primary-language string changes recorded by a sync.

use masterbook_core::{MasterDb, StringChange};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the string_diff_log tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StringDiffLogParams {
    /// Master-data version the changes were recorded under.
    pub version: String,
}

/// Output from the string_diff_log tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StringDiffLogOutput {
    pub version: String,
    /// Changes ordered by string key.
    pub changes: Vec<StringChange>,
}

/// Implementation of the string_diff_log tool.
pub async fn diff_log_impl(db: &MasterDb, params: StringDiffLogParams) -> Result<CallToolResult, McpError> {
    let changes = db.string_diff_log(&params.version).await?;
    json_result(&StringDiffLogOutput { version: params.version, changes })
}
