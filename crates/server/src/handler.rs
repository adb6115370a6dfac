//! MCP server handler implementation.
//!
//! Routes tool calls to the sync orchestration, the relational store, and the
//! table cache.

use std::sync::Arc;

use crate::sync::MasterSync;
use crate::tools::{
    AliasAddParams, AliasLookupParams, AltBaseAssignParams, CharacterQueryParams, MasterSyncParams,
    StringDiffLogParams, aliases, cache_status, characters, master_sync, strings,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for masterbook.
#[derive(Clone)]
pub struct MasterbookServer {
    sync: Arc<MasterSync>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MasterbookServer {
    pub fn new(sync: Arc<MasterSync>) -> Self {
        Self { sync, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Refresh master data and sync characters, aliases, and localized strings. Returns refetched tables and new character ids."
    )]
    async fn master_sync(&self, params: Parameters<MasterSyncParams>) -> Result<CallToolResult, McpError> {
        master_sync::master_sync_impl(&self.sync, params.0).await
    }

    #[tool(description = "Query characters by one column, either an exact value or an inclusive min/max range.")]
    async fn character_query(&self, params: Parameters<CharacterQueryParams>) -> Result<CallToolResult, McpError> {
        characters::query_impl(self.sync.db(), params.0).await
    }

    #[tool(description = "Resolve a name, title, or nickname to a character with its alt-group and aliases.")]
    async fn alias_lookup(&self, params: Parameters<AliasLookupParams>) -> Result<CallToolResult, McpError> {
        aliases::lookup_impl(self.sync.db(), params.0).await
    }

    #[tool(description = "Add a custom alias for a character. Reports added=false when the alias is taken.")]
    async fn alias_add(&self, params: Parameters<AliasAddParams>) -> Result<CallToolResult, McpError> {
        aliases::add_impl(self.sync.db(), params.0).await
    }

    #[tool(description = "Move a character into the alt-group rooted at base_id.")]
    async fn alt_base_assign(&self, params: Parameters<AltBaseAssignParams>) -> Result<CallToolResult, McpError> {
        aliases::assign_impl(self.sync.db(), params.0).await
    }

    #[tool(description = "List primary-language string changes recorded for a master-data version.")]
    async fn string_diff_log(&self, params: Parameters<StringDiffLogParams>) -> Result<CallToolResult, McpError> {
        strings::diff_log_impl(self.sync.db(), params.0).await
    }

    #[tool(description = "Show the installed master-data version and which tables are cached.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        cache_status::status_impl(self.sync.cache()).await
    }
}

impl ServerHandler for MasterbookServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "masterbook".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{fake_source, sync_with};

    #[tokio::test]
    async fn test_tools_listed() {
        let server = MasterbookServer::new(Arc::new(sync_with(fake_source()).await));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "alias_add",
                "alias_lookup",
                "alt_base_assign",
                "cache_status",
                "character_query",
                "master_sync",
                "string_diff_log",
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let info = MasterbookServer::new(Arc::new(sync_with(fake_source()).await)).get_info();
        assert_eq!(info.server_info.name, "masterbook");
        assert!(info.capabilities.tools.is_some());
    }
}
