//! Per-session conversation state and the registry that owns it.

use crate::aspect::AspectRatio;
use crate::error::Result;
use crate::gemini::ChatTurn;
use crate::history::{ImageHistoryStore, DEFAULT_HISTORY_CAPACITY};
use std::collections::HashMap;

pub const DEFAULT_SESSION_ID: &str = "default";

/// Everything remembered for one session key.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub history: ImageHistoryStore,
    pub transcript: Vec<ChatTurn>,
    pub aspect_ratio: Option<AspectRatio>,
}

impl ConversationContext {
    fn new(history_capacity: usize) -> Self {
        Self {
            history: ImageHistoryStore::new(history_capacity),
            transcript: Vec::new(),
            aspect_ratio: None,
        }
    }
}

#[derive(Debug)]
pub struct ConversationRegistry {
    sessions: HashMap<String, ConversationContext>,
    history_capacity: usize,
}

impl ConversationRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            history_capacity,
        }
    }

    pub fn get_or_create(&mut self, session_id: &str) -> &mut ConversationContext {
        let capacity = self.history_capacity;
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id, "Creating conversation context");
                ConversationContext::new(capacity)
            })
    }

    /// Read-only lookup that does not create the session.
    pub fn get(&self, session_id: &str) -> Option<&ConversationContext> {
        self.sessions.get(session_id)
    }

    /// Drops the session entirely. Returns whether it existed.
    pub fn clear(&mut self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn set_aspect_ratio(&mut self, session_id: &str, ratio: &str) -> Result<AspectRatio> {
        let ratio: AspectRatio = ratio.parse()?;
        self.get_or_create(session_id).aspect_ratio = Some(ratio);
        Ok(ratio)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn sessions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Maps an absent or blank session id to the default session.
pub fn session_key(session_id: Option<&str>) -> &str {
    match session_id.map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_SESSION_ID,
    }
}
