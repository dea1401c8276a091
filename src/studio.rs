//! Tool operations over the session registry, independent of the MCP layer.

use crate::aspect::{effective_aspect_ratio, AspectRatio};
use crate::error::Result;
use crate::gemini::{ChatTurn, GenerationClient, Part};
use crate::history::{ImageHistoryEntry, ImagePayload, Provenance};
use crate::resolver::{FailedReference, ReferenceResolver};
use crate::session::ConversationRegistry;
use crate::storage::ImageSaver;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: String,
    pub turns: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_references: Vec<FailedReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    pub session_id: String,
    pub id: String,
    pub file_path: PathBuf,
    /// `history:N` for the new entry at the time it was appended.
    pub reference: String,
    pub provenance: Provenance,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_references: Vec<FailedReference>,
    #[serde(skip)]
    pub payload: ImagePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub reference: String,
    pub id: String,
    pub file_path: PathBuf,
    pub prompt: String,
    pub provenance: Provenance,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub session_id: String,
    pub capacity: usize,
    pub aspect_ratio: Option<AspectRatio>,
    pub chat_turns: usize,
    pub images: Vec<HistoryItem>,
}

pub struct Studio {
    client: Arc<dyn GenerationClient>,
    resolver: ReferenceResolver,
    saver: ImageSaver,
    registry: Mutex<ConversationRegistry>,
}

impl Studio {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        resolver: ReferenceResolver,
        saver: ImageSaver,
        registry: ConversationRegistry,
    ) -> Self {
        Self {
            client,
            resolver,
            saver,
            registry: Mutex::new(registry),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.client.backend_name()
    }

    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        images: &[String],
    ) -> Result<ChatOutcome> {
        let (user_turn, mut turns, failed_references) = {
            let mut registry = self.registry.lock().await;
            let ctx = registry.get_or_create(session_id);
            let batch = self.resolver.resolve_all(&ctx.history, images).await;

            let mut parts = vec![Part::text(message)];
            parts.extend(batch.payloads.into_iter().map(Part::image));
            let user_turn = ChatTurn::user(parts);
            (user_turn, ctx.transcript.clone(), batch.failed)
        };
        turns.push(user_turn.clone());

        tracing::debug!(session_id, turns = turns.len(), "Sending chat");
        let reply = self.client.chat(turns).await?;

        let mut registry = self.registry.lock().await;
        let ctx = registry.get_or_create(session_id);
        ctx.transcript.push(user_turn);
        ctx.transcript.push(ChatTurn::model(reply.clone()));

        Ok(ChatOutcome {
            session_id: session_id.to_string(),
            reply,
            turns: ctx.transcript.len(),
            failed_references,
        })
    }

    pub async fn generate_image(
        &self,
        session_id: &str,
        prompt: &str,
        reference_images: &[String],
        aspect_ratio: Option<&str>,
    ) -> Result<ImageOutcome> {
        let (ratio, references, failed_references) = {
            let mut registry = self.registry.lock().await;
            let ctx = registry.get_or_create(session_id);
            let ratio = effective_aspect_ratio(session_id, aspect_ratio, ctx.aspect_ratio)?;
            let batch = self.resolver.resolve_all(&ctx.history, reference_images).await;
            (ratio, batch.payloads, batch.failed)
        };

        let mut parts = vec![Part::text(prompt)];
        parts.extend(references.into_iter().map(Part::image));

        self.produce(session_id, prompt, parts, ratio, Provenance::Generated, failed_references)
            .await
    }

    /// Edit `image`; unlike reference images, a missing source fails the call.
    pub async fn edit_image(
        &self,
        session_id: &str,
        image: &str,
        instructions: &str,
        reference_images: &[String],
        aspect_ratio: Option<&str>,
    ) -> Result<ImageOutcome> {
        let (ratio, source, references, failed_references) = {
            let mut registry = self.registry.lock().await;
            let ctx = registry.get_or_create(session_id);
            let ratio = effective_aspect_ratio(session_id, aspect_ratio, ctx.aspect_ratio)?;
            let source = self.resolver.resolve(&ctx.history, image).await?;
            let batch = self.resolver.resolve_all(&ctx.history, reference_images).await;
            (ratio, source, batch.payloads, batch.failed)
        };

        let mut parts = vec![Part::text(instructions), Part::image(source)];
        parts.extend(references.into_iter().map(Part::image));

        self.produce(session_id, instructions, parts, ratio, Provenance::Edited, failed_references)
            .await
    }

    async fn produce(
        &self,
        session_id: &str,
        prompt: &str,
        parts: Vec<Part>,
        ratio: AspectRatio,
        provenance: Provenance,
        failed_references: Vec<FailedReference>,
    ) -> Result<ImageOutcome> {
        tracing::debug!(
            session_id,
            parts = parts.len(),
            aspect_ratio = %ratio,
            provenance = provenance.as_str(),
            "Requesting image"
        );
        let generated = self.client.generate_image(parts, ratio).await?;
        let file_path = self.saver.save(&generated.payload, provenance).await?;

        let entry = ImageHistoryEntry::new(
            file_path.clone(),
            generated.payload.clone(),
            prompt,
            provenance,
        );
        let id = entry.id.clone();

        let mut registry = self.registry.lock().await;
        let history = &mut registry.get_or_create(session_id).history;
        history.append(entry);
        let index = history.len() - 1;

        Ok(ImageOutcome {
            session_id: session_id.to_string(),
            id,
            file_path,
            reference: format!("history:{index}"),
            provenance,
            aspect_ratio: ratio,
            text: generated.text,
            failed_references,
            payload: generated.payload,
        })
    }

    pub async fn set_aspect_ratio(&self, session_id: &str, ratio: &str) -> Result<AspectRatio> {
        let ratio = self.registry.lock().await.set_aspect_ratio(session_id, ratio)?;
        tracing::info!(session_id, aspect_ratio = %ratio, "Aspect ratio set");
        Ok(ratio)
    }

    /// Reports without creating the session.
    pub async fn history(&self, session_id: &str) -> HistoryReport {
        let registry = self.registry.lock().await;
        let Some(ctx) = registry.get(session_id) else {
            return HistoryReport {
                session_id: session_id.to_string(),
                capacity: registry.history_capacity(),
                aspect_ratio: None,
                chat_turns: 0,
                images: Vec::new(),
            };
        };

        let images = ctx
            .history
            .list()
            .map(|(index, entry)| HistoryItem {
                reference: format!("history:{index}"),
                id: entry.id.clone(),
                file_path: entry.file_path.clone(),
                prompt: entry.prompt.clone(),
                provenance: entry.provenance,
                mime_type: entry.payload.mime_type.clone(),
                created_at: entry.created_at,
            })
            .collect();

        HistoryReport {
            session_id: session_id.to_string(),
            capacity: ctx.history.capacity(),
            aspect_ratio: ctx.aspect_ratio,
            chat_turns: ctx.transcript.len(),
            images,
        }
    }

    pub async fn clear(&self, session_id: &str) -> bool {
        let existed = self.registry.lock().await.clear(session_id);
        tracing::info!(session_id, existed, "Conversation cleared");
        existed
    }

    pub async fn sessions(&self) -> Vec<String> {
        self.registry.lock().await.sessions()
    }
}
