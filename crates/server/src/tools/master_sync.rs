//! master_sync tool implementation.
//!
//! Runs one sync cycle: cache refresh, then string, character, and alias
//! upserts for the touched tables.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::sync::MasterSync;

/// Parameters for the master_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MasterSyncParams {
    /// Re-upsert every tracked table even when its hash did not change.
    #[serde(default)]
    pub force: bool,
}

/// Implementation of the master_sync tool.
pub async fn master_sync_impl(sync: &MasterSync, params: MasterSyncParams) -> Result<CallToolResult, McpError> {
    let summary = sync.run(params.force).await?;
    json_result(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{fake_source, sync_with};
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_master_sync_reports_new_characters() {
        let sync = sync_with(fake_source()).await;

        let result = master_sync_impl(&sync, MasterSyncParams::default()).await.unwrap();
        let json = result_json(&result);
        assert_eq!(json["new_chars"], serde_json::json!([1, 2]));
        assert_eq!(json["version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_master_sync_transport_failure() {
        let source = fake_source();
        source.fail_table(masterbook_core::CHARACTER_TABLE, true);
        let sync = sync_with(source).await;

        let err = master_sync_impl(&sync, MasterSyncParams { force: true }).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }
}
