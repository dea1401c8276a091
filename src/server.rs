//! MCP Server implementation for Nano Banana.

use crate::config::Config;
use crate::gemini::build_client;
use crate::resolver::ReferenceResolver;
use crate::session::{session_key, ConversationRegistry};
use crate::storage::ImageSaver;
use crate::studio::{ImageOutcome, Studio};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::schemars::{self, JsonSchema};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServiceExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input parameters for the gemini_chat tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for chatting with Gemini")]
pub struct ChatInput {
    #[schemars(description = "The message to send")]
    pub message: String,

    #[schemars(description = "Images to include: file paths, \"last\", or \"history:N\"")]
    #[serde(default)]
    pub images: Vec<String>,

    #[schemars(description = "Conversation to continue (default: \"default\")")]
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Input parameters for the generate_image tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for generating an image")]
pub struct GenerateImageInput {
    #[schemars(description = "Description of the image to generate")]
    pub prompt: String,

    #[schemars(description = "Reference images: file paths, \"last\", or \"history:N\"")]
    #[serde(default)]
    pub reference_images: Vec<String>,

    #[schemars(description = "Aspect ratio for this call only (1:1, 9:16, 16:9, 3:4, 4:3, 3:2, 2:3, 5:4, 4:5, 21:9)")]
    #[serde(default)]
    pub aspect_ratio: Option<String>,

    #[schemars(description = "Conversation whose image history to use (default: \"default\")")]
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Input parameters for the edit_image tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for editing an image")]
pub struct EditImageInput {
    #[schemars(description = "Image to edit: a file path, \"last\", or \"history:N\"")]
    pub image: String,

    #[schemars(description = "What to change")]
    pub instructions: String,

    #[schemars(description = "Additional reference images: file paths, \"last\", or \"history:N\"")]
    #[serde(default)]
    pub reference_images: Vec<String>,

    #[schemars(description = "Aspect ratio for this call only (1:1, 9:16, 16:9, 3:4, 4:3, 3:2, 2:3, 5:4, 4:5, 21:9)")]
    #[serde(default)]
    pub aspect_ratio: Option<String>,

    #[schemars(description = "Conversation whose image history to use (default: \"default\")")]
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Input parameters for the set_aspect_ratio tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatioInput {
    #[schemars(description = "One of 1:1, 9:16, 16:9, 3:4, 4:3, 3:2, 2:3, 5:4, 4:5, 21:9")]
    pub aspect_ratio: String,

    #[schemars(description = "Conversation to configure (default: \"default\")")]
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Input for tools that only take a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionInput {
    #[schemars(description = "Conversation to act on (default: \"default\")")]
    #[serde(default)]
    pub session_id: Option<String>,
}

/// JSON envelope returned by every tool.
#[derive(Debug, Serialize)]
pub struct ToolResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Tool call failed");
                Self {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn to_json(&self) -> String {
        // Use serde_json to ensure proper escaping
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": format!("JSON serialization error: {e}") })
                .to_string()
        })
    }
}

fn text_result<T: Serialize>(response: ToolResponse<T>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(response.to_json())])
}

/// Image tools return the JSON summary plus the image itself.
fn image_result(result: crate::Result<ImageOutcome>) -> CallToolResult {
    let image = result
        .as_ref()
        .ok()
        .map(|outcome| Content::image(outcome.payload.data_base64.clone(), outcome.payload.mime_type.clone()));
    let mut content = vec![Content::text(ToolResponse::from_result(result).to_json())];
    content.extend(image);
    CallToolResult::success(content)
}

/// The Nano Banana MCP Server.
#[derive(Clone)]
pub struct NanoBananaServer {
    studio: Arc<Studio>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NanoBananaServer {
    pub fn new(studio: Arc<Studio>) -> Self {
        Self {
            studio,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "gemini_chat",
        description = "Chat with Gemini. The conversation is remembered per `session_id`, and images can be attached by file path or by `last` / `history:N` from this session's image history.

**Return structure:**
- `success`: boolean indicating execution status
- `reply`: the model's answer
- `failed_references`: images that could not be loaded (the chat still proceeds)
- `error`: error description when `success=false`"
    )]
    async fn gemini_chat(
        &self,
        Parameters(input): Parameters<ChatInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let result = self.studio.chat(session_id, &input.message, &input.images).await;
        Ok(text_result(ToolResponse::from_result(result)))
    }

    #[tool(
        name = "generate_image",
        description = "Generate an image from a text prompt, optionally guided by reference images. The result is saved to disk and appended to the session's image history, where later calls can refer to it as `last` or `history:N`.

An aspect ratio is required: pass `aspect_ratio` for this call or set a session default with `set_aspect_ratio`."
    )]
    async fn generate_image(
        &self,
        Parameters(input): Parameters<GenerateImageInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let result = self
            .studio
            .generate_image(
                session_id,
                &input.prompt,
                &input.reference_images,
                input.aspect_ratio.as_deref(),
            )
            .await;
        Ok(image_result(result))
    }

    #[tool(
        name = "edit_image",
        description = "Edit an existing image following instructions. `image` may be a file path, a bare file name from the output folder, `last`, or `history:N`. The edited image is saved and appended to the session's image history."
    )]
    async fn edit_image(
        &self,
        Parameters(input): Parameters<EditImageInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let result = self
            .studio
            .edit_image(
                session_id,
                &input.image,
                &input.instructions,
                &input.reference_images,
                input.aspect_ratio.as_deref(),
            )
            .await;
        Ok(image_result(result))
    }

    #[tool(
        name = "set_aspect_ratio",
        description = "Set the default aspect ratio for image generation and editing in a session. It stays in effect until changed or the session is cleared; a per-call `aspect_ratio` overrides it for that call only."
    )]
    async fn set_aspect_ratio(
        &self,
        Parameters(input): Parameters<AspectRatioInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let result = self
            .studio
            .set_aspect_ratio(session_id, &input.aspect_ratio)
            .await
            .map(|ratio| serde_json::json!({ "session_id": session_id, "aspect_ratio": ratio }));
        Ok(text_result(ToolResponse::from_result(result)))
    }

    #[tool(
        name = "get_image_history",
        description = "List the images remembered for a session, oldest first, with the `history:N` reference for each."
    )]
    async fn get_image_history(
        &self,
        Parameters(input): Parameters<SessionInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let report = self.studio.history(session_id).await;
        Ok(text_result(ToolResponse::from_result(Ok::<_, crate::NanoBananaError>(report))))
    }

    #[tool(
        name = "clear_conversation",
        description = "Forget a session entirely: chat history, image history and aspect ratio. Saved files on disk are kept."
    )]
    async fn clear_conversation(
        &self,
        Parameters(input): Parameters<SessionInput>,
    ) -> Result<CallToolResult, McpError> {
        let session_id = session_key(input.session_id.as_deref());
        let existed = self.studio.clear(session_id).await;
        let body = serde_json::json!({ "session_id": session_id, "cleared": existed });
        Ok(text_result(ToolResponse::from_result(Ok::<_, crate::NanoBananaError>(body))))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for NanoBananaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "Nano Banana MCP Server - Gemini chat, image generation and image editing ({} backend). \
                Images are remembered per session and can be referenced as `last` or `history:N`.",
                self.studio.backend_name()
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Build the studio for `config`.
pub fn build_studio(config: &Config) -> anyhow::Result<Studio> {
    let client = build_client(config)?;
    Ok(Studio::new(
        client,
        ReferenceResolver::new(&config.output_dir),
        ImageSaver::new(&config.output_dir),
        ConversationRegistry::new(config.history_capacity),
    ))
}

/// Create and run the MCP server over stdio transport.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!(?config, "Starting Nano Banana MCP Server...");

    let server = NanoBananaServer::new(Arc::new(build_studio(&config)?));
    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Nano Banana MCP Server is running");

    service.waiting().await?;

    tracing::info!("Nano Banana MCP Server shutting down");
    Ok(())
}
