//! Nano Banana MCP Server - Gemini chat, image generation and image editing
//! as MCP tools.
//!
//! Each session keeps its own chat transcript, aspect ratio and a bounded
//! history of produced images. Tool arguments can point at those images with
//! `last` or `history:N` instead of a file path.

pub mod aspect;
pub mod config;
pub mod error;
pub mod gemini;
pub mod history;
pub mod resolver;
pub mod server;
pub mod session;
pub mod storage;
pub mod studio;

pub use aspect::AspectRatio;
pub use config::{Backend, Config};
pub use error::{ConfigError, NanoBananaError, Result};
pub use gemini::{ChatTurn, GeneratedImage, GenerationClient, Part};
pub use history::{ImageHistoryEntry, ImageHistoryStore, ImagePayload, Provenance};
pub use resolver::ReferenceResolver;
pub use server::{run_server, NanoBananaServer};
pub use session::{ConversationContext, ConversationRegistry};
pub use storage::ImageSaver;
pub use studio::Studio;
