//! Error types for the Nano Banana MCP server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NanoBananaError {
    #[error(
        "Could not resolve image reference '{reference}': {reason}. \
        Use \"last\" for the most recent image or \"history:N\" for an earlier one"
    )]
    InvalidReference { reference: String, reason: String },

    #[error("Invalid aspect ratio '{0}'. Supported: 1:1, 9:16, 16:9, 3:4, 4:3, 3:2, 2:3, 5:4, 4:5, 21:9")]
    InvalidAspectRatio(String),

    #[error(
        "No aspect ratio set for session '{0}'. \
        Pass `aspect_ratio` or call `set_aspect_ratio` first"
    )]
    MissingAspectRatio(String),

    #[error("Image generation failed: {0}")]
    UpstreamGenerationFailure(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while assembling the server configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no API key provided (set GEMINI_API_KEY or pass --api-key)")]
    MissingApiKey,

    #[error("history capacity must be at least 1")]
    ZeroCapacity,

    #[error("could not determine the home directory for the default output folder")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, NanoBananaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reference_suggests_symbolic_syntax() {
        let err = NanoBananaError::InvalidReference {
            reference: "cat.png".to_string(),
            reason: "file not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cat.png"));
        assert!(msg.contains("\"last\""));
        assert!(msg.contains("history:N"));
    }

    #[test]
    fn config_error_converts() {
        let err: NanoBananaError = ConfigError::MissingApiKey.into();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }
}
