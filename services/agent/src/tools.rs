//! In-process MCP plumbing for the advisor's tools.
//!
//! `FinanceAdvisor` is served over an in-memory duplex pipe and reached through
//! an MCP client, so the reply cycle sees tools only as names, schemas and text
//! results.

use anyhow::{Context, Result};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs};
use finbot_core::{advisor::FinanceAdvisor, llm_client::ToolCall};
use rmcp::{
    ServiceError, ServiceExt,
    model::{CallToolRequestParam, ErrorCode, RawContent},
    service::{RoleClient, RunningService},
};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub struct AdvisorTools {
    client: RunningService<RoleClient, ()>,
    server: JoinHandle<()>,
    definitions: Vec<ChatCompletionTool>,
}

impl AdvisorTools {
    /// Spawns the tool server and lists its tools in LLM function format.
    pub async fn start(advisor: FinanceAdvisor) -> Result<Self> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);

        let server = tokio::spawn(async move {
            match advisor.serve(server_transport).await {
                Ok(service) => {
                    let _ = service.waiting().await;
                }
                Err(e) => error!(error = ?e, "Advisor tool server failed to start"),
            }
        });
        let client = ().serve(client_transport).await?;

        let definitions = client
            .list_all_tools()
            .await?
            .into_iter()
            .map(|t| {
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(t.name)
                            .description(t.description.unwrap_or_default())
                            .parameters(serde_json::to_value(&*t.input_schema)?)
                            .build()?,
                    )
                    .build()?)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(tools = definitions.len(), "Advisor tools registered");

        Ok(Self {
            client,
            server,
            definitions,
        })
    }

    pub fn definitions(&self) -> &[ChatCompletionTool] {
        &self.definitions
    }

    /// Executes one LLM tool call and returns its text result.
    ///
    /// Tool-level failures (invalid loan terms, malformed or mistyped
    /// arguments) come back as text so the LLM can explain or retry them; only
    /// transport failures are errors here.
    pub async fn call(&self, call: &ToolCall) -> Result<String> {
        let name = &call.function.name;
        let arguments = match serde_json::from_str(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool arguments are not a JSON object");
                return Ok(format!("Invalid arguments for tool '{name}': {e}"));
            }
        };

        let result = match self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.clone().into(),
                arguments: Some(arguments),
            })
            .await
        {
            Ok(result) => result,
            Err(ServiceError::McpError(e)) if e.code == ErrorCode::INVALID_PARAMS => {
                warn!(tool = %name, error = %e.message, "Tool rejected its arguments");
                return Ok(format!("Invalid arguments for tool '{name}': {}", e.message));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Tool '{name}' call failed"));
            }
        };

        let annotated_content = result
            .content
            .context("Tool call returned no content")?
            .pop()
            .context("Content list was empty")?;
        Ok(match annotated_content.raw {
            RawContent::Text(text_content) => text_content.text,
            _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
        })
    }
}

impl Drop for AdvisorTools {
    fn drop(&mut self) {
        self.server.abort();
    }
}
