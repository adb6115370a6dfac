//! Alias tools: lookup, custom aliases, and manual alt-group assignment.

use masterbook_core::{AliasRecord, AltGroup, CharacterRow, Error, MasterDb};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the alias_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AliasLookupParams {
    /// Free text; case, spaces, and punctuation are ignored.
    pub alias: String,
}

/// Output from the alias_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AliasLookupOutput {
    pub character: CharacterRow,
    pub alt_group: Option<AltGroup>,
    /// Every alias of the resolved character.
    pub aliases: Vec<AliasRecord>,
}

/// Parameters for the alias_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AliasAddParams {
    pub char_id: i64,
    pub alias: String,
}

/// Output from the alias_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AliasAddOutput {
    /// False when the alias was already taken.
    pub added: bool,
}

/// Parameters for the alt_base_assign tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AltBaseAssignParams {
    pub char_id: i64,
    /// Base of the target group; must not exceed `char_id`.
    pub base_id: i64,
}

/// Implementation of the alias_lookup tool.
pub async fn lookup_impl(db: &MasterDb, params: AliasLookupParams) -> Result<CallToolResult, McpError> {
    let char_id = db
        .resolve_alias(&params.alias)
        .await?
        .ok_or_else(|| Error::InvalidInput(format!("no character known as {:?}", params.alias)))?;
    let character = db
        .get_character(char_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("alias points at missing character {char_id}")))?;

    let output = AliasLookupOutput {
        character,
        alt_group: db.alt_group(char_id).await?,
        aliases: db.aliases_for(char_id).await?,
    };
    json_result(&output)
}

/// Implementation of the alias_add tool.
pub async fn add_impl(db: &MasterDb, params: AliasAddParams) -> Result<CallToolResult, McpError> {
    let added = db.add_custom_alias(params.char_id, &params.alias).await?;
    if !added {
        tracing::info!(char_id = params.char_id, alias = %params.alias, "alias already taken");
    }
    json_result(&AliasAddOutput { added })
}

/// Implementation of the alt_base_assign tool.
pub async fn assign_impl(db: &MasterDb, params: AltBaseAssignParams) -> Result<CallToolResult, McpError> {
    let group = db.assign_alt_base(params.char_id, params.base_id).await?;
    json_result(&group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{fake_source, sync_with};
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_lookup_by_title() {
        let sync = sync_with(fake_source()).await;
        sync.run(false).await.unwrap();

        let params = AliasLookupParams { alias: "queen of the night".to_string() };
        let json = result_json(&lookup_impl(sync.db(), params).await.unwrap());
        assert_eq!(json["character"]["id"], 1);
        assert_eq!(json["alt_group"]["base_id"], 1);
        assert!(json["aliases"].as_array().unwrap().iter().any(|a| a["alias"] == "monica"));
    }

    #[tokio::test]
    async fn test_lookup_unknown_alias() {
        let sync = sync_with(fake_source()).await;
        sync.run(false).await.unwrap();

        let err = lookup_impl(sync.db(), AliasLookupParams { alias: "nobody".to_string() }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_add_then_duplicate() {
        let sync = sync_with(fake_source()).await;
        sync.run(false).await.unwrap();

        let params = AliasAddParams { char_id: 2, alias: "Cord".to_string() };
        let first = result_json(&add_impl(sync.db(), params.clone()).await.unwrap());
        assert_eq!(first["added"], true);

        let second = result_json(&add_impl(sync.db(), params).await.unwrap());
        assert_eq!(second["added"], false);
        assert_eq!(sync.db().resolve_alias("cord").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_assign_rejects_higher_base() {
        let sync = sync_with(fake_source()).await;
        sync.run(false).await.unwrap();

        let err = assign_impl(sync.db(), AltBaseAssignParams { char_id: 1, base_id: 2 }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);

        let json = result_json(&assign_impl(sync.db(), AltBaseAssignParams { char_id: 2, base_id: 1 }).await.unwrap());
        assert_eq!(json["base_id"], 1);
        assert_eq!(json["serial"], 1);
    }
}
