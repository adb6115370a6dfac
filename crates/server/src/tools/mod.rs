//! MCP tool implementations.
//!
//! Every tool answers with a single pretty-printed JSON text block.

pub mod aliases;
pub mod cache_status;
pub mod characters;
pub mod master_sync;
pub mod strings;

pub use aliases::{AliasAddParams, AliasLookupParams, AltBaseAssignParams};
pub use characters::CharacterQueryParams;
pub use master_sync::MasterSyncParams;
pub use strings::StringDiffLogParams;

use masterbook_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Internal(format!("Failed to serialize tool output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let text = result
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.clone())
        .unwrap_or_default();
    serde_json::from_str(&text).unwrap()
}
