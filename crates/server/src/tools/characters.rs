//! character_query tool implementation.

use masterbook_core::{CharacterQuery, CharacterRow, MasterDb};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the character_query tool.
pub type CharacterQueryParams = CharacterQuery;

/// Output from the character_query tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CharacterQueryOutput {
    pub count: usize,
    /// Matches ordered by the queried column, then id.
    pub characters: Vec<CharacterRow>,
}

/// Implementation of the character_query tool.
pub async fn query_impl(db: &MasterDb, params: CharacterQueryParams) -> Result<CallToolResult, McpError> {
    let characters = db.query_characters(&params).await?;
    json_result(&CharacterQueryOutput { count: characters.len(), characters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{fake_source, sync_with};
    use crate::tools::result_json;
    use masterbook_core::{CharacterColumn, ColumnValue};

    #[tokio::test]
    async fn test_query_by_speed_range() {
        let sync = sync_with(fake_source()).await;
        sync.run(false).await.unwrap();

        let params = CharacterQuery::range(CharacterColumn::Speed, Some(ColumnValue::Int(3050)), None);
        let json = result_json(&query_impl(sync.db(), params).await.unwrap());
        assert_eq!(json["count"], 1);
        assert_eq!(json["characters"][0]["id"], 2);
        assert_eq!(json["characters"][0]["element"], "Azure");
        assert_eq!(json["characters"][0]["base_rarity"], "SSR");
    }

    #[tokio::test]
    async fn test_query_type_mismatch() {
        let db = MasterDb::open_in_memory().await.unwrap();
        let params = CharacterQuery::exact(CharacterColumn::Element, ColumnValue::Int(1));

        let err = query_impl(&db, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[test]
    fn test_params_deserialize() {
        let params: CharacterQueryParams =
            serde_json::from_value(serde_json::json!({ "column": "job", "value": "Sniper" })).unwrap();
        assert_eq!(params.column, CharacterColumn::Job);
        assert_eq!(params.value, Some(ColumnValue::Text("Sniper".into())));
        assert!(params.min_value.is_none());
    }
}
