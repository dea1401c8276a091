//! Per-session bounded log of generated and edited images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

const LAST_REFERENCE: &str = "last";
const HISTORY_PREFIX: &str = "history:";

/// How a history entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Generated,
    Edited,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Generated => "generated",
            Provenance::Edited => "edited",
        }
    }
}

/// Image bytes as sent to and received from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Standard base64, no line breaks.
    pub data_base64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct ImageHistoryEntry {
    pub id: String,
    pub file_path: PathBuf,
    pub payload: ImagePayload,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl ImageHistoryEntry {
    pub fn new(
        file_path: PathBuf,
        payload: ImagePayload,
        prompt: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        let created_at = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}_{}", created_at.timestamp_millis(), &suffix[..8]),
            file_path,
            payload,
            prompt: prompt.into(),
            created_at,
            provenance,
        }
    }
}

/// Parsed form of a symbolic reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRef {
    Last,
    Index(usize),
}

impl HistoryRef {
    /// Returns `None` for anything that is not exactly `last` or
    /// `history:<digits>`; callers treat that as a path.
    pub fn parse(reference: &str) -> Option<Self> {
        if reference == LAST_REFERENCE {
            return Some(HistoryRef::Last);
        }
        let digits = reference.strip_prefix(HISTORY_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(HistoryRef::Index)
    }
}

#[derive(Debug, Clone)]
pub struct ImageHistoryStore {
    entries: VecDeque<ImageHistoryEntry>,
    capacity: usize,
}

impl ImageHistoryStore {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, entry: ImageHistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(id = %evicted.id, "Evicted oldest history entry");
            }
        }
    }

    pub fn get_by_reference(&self, reference: &str) -> Option<&ImageHistoryEntry> {
        match HistoryRef::parse(reference)? {
            HistoryRef::Last => self.entries.back(),
            HistoryRef::Index(i) => self.entries.get(i),
        }
    }

    pub fn list(&self) -> impl Iterator<Item = (usize, &ImageHistoryEntry)> {
        self.entries.iter().enumerate()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ImageHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
