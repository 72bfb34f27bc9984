//! The Altary tool surface served over MCP.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::app::{App, SetupOutcome};
use crate::error::AltaryError;
use crate::mcp::params::{
    CompleteErrorRequest, GetErrorsRequest, SetDefaultProjectRequest, SetupAuthRequest,
};
use crate::mcp::render;

const INSTRUCTIONS: &str = "Altary error tracking. Run setup_auth once to connect \
(omit the token to log in through the browser), pick a project with get_user_projects \
and set_default_project, then use get_errors to list open errors and complete_error \
to mark one fixed together with its similar errors.";

#[derive(Clone)]
pub struct AltaryServer {
    app: Arc<App>,
    tool_router: ToolRouter<Self>,
}

impl AltaryServer {
    pub fn new(app: Arc<App>) -> Self {
        AltaryServer {
            app,
            tool_router: Self::tool_router(),
        }
    }
}

fn success(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

fn failure(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(text.into())]))
}

fn operation_failed(tool: &str, err: AltaryError) -> Result<CallToolResult, McpError> {
    tracing::warn!(tool, %err, "tool call failed");
    failure(render::failure(&format!("{tool} failed"), &err))
}

/// Success text or payload-level failure text from a renderer.
fn rendered(result: Result<String, String>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(text) => success(text),
        Err(text) => failure(text),
    }
}

#[tool_router]
impl AltaryServer {
    #[tool(description = "List the Altary projects of the authenticated user, marking the default project.")]
    async fn get_user_projects(&self) -> Result<CallToolResult, McpError> {
        match self.app.list_projects().await {
            Ok(listing) => success(render::projects(&listing)),
            Err(err) => operation_failed("get_user_projects", err),
        }
    }

    #[tool(
        description = "List the errors of a project, labelled A-Z (at most 26 shown). Uses the default project when project_id is omitted."
    )]
    async fn get_errors(
        &self,
        Parameters(req): Parameters<GetErrorsRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.app.get_errors(req.project_id.as_deref()).await {
            Ok(payload) => rendered(render::errors(&payload)),
            Err(err) => operation_failed("get_errors", err),
        }
    }

    #[tool(
        description = "Mark an error as completed. Altary also completes errors similar to it and reports them."
    )]
    async fn complete_error(
        &self,
        Parameters(req): Parameters<CompleteErrorRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.app.complete_error(&req.error_id).await {
            Ok(payload) => rendered(render::completion(&payload, req.error_id.trim())),
            Err(err) => operation_failed("complete_error", err),
        }
    }

    #[tool(
        description = "Connect to Altary. With a token, validate and save it. Without one, open the browser login and save the token it returns."
    )]
    async fn setup_auth(
        &self,
        Parameters(req): Parameters<SetupAuthRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.app.setup_auth(req.token.as_deref()).await {
            Ok(outcome @ SetupOutcome::Authenticated { .. }) => success(render::setup(&outcome)),
            Ok(outcome) => failure(render::setup(&outcome)),
            Err(err) => operation_failed("setup_auth", err),
        }
    }

    #[tool(
        description = "Set the default project used by get_errors. The id must start with ALTR- and belong to one of your projects."
    )]
    async fn set_default_project(
        &self,
        Parameters(req): Parameters<SetDefaultProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.app.set_default_project(&req.project_id).await {
            Ok(project) => success(render::default_project(&project)),
            Err(err) => operation_failed("set_default_project", err),
        }
    }

    #[tool(description = "Show the current configuration with the token masked.")]
    async fn show_config(&self) -> Result<CallToolResult, McpError> {
        success(render::config(&self.app.show_config().await))
    }

    #[tool(description = "Remove the stored token and default project.")]
    async fn clear_config(&self) -> Result<CallToolResult, McpError> {
        match self.app.clear_config().await {
            Ok(()) => success(render::CLEARED),
            Err(err) => operation_failed("clear_config", err),
        }
    }
}

#[tool_handler]
impl ServerHandler for AltaryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
