//! Runtime configuration assembled from CLI flags and environment variables.

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const OUTPUT_DIR_NAME: &str = "nanobanana_generated";

/// Which upstream API serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Gemini Developer API (generativelanguage.googleapis.com).
    #[default]
    Gemini,
    /// Vertex AI express mode (aiplatform.googleapis.com).
    Vertex,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gemini => f.write_str("gemini"),
            Backend::Vertex => f.write_str("vertex"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub backend: Backend,
    pub api_key: String,
    pub chat_model: String,
    pub image_model: String,
    pub output_dir: PathBuf,
    pub history_capacity: usize,
}

impl Config {
    /// Fill in defaults for anything not supplied and validate the result.
    pub fn resolve(
        backend: Backend,
        api_key: Option<String>,
        chat_model: Option<String>,
        image_model: Option<String>,
        output_dir: Option<PathBuf>,
        history_capacity: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let output_dir = match output_dir {
            Some(dir) => dir,
            None => default_output_dir().ok_or(ConfigError::NoHomeDir)?,
        };
        let config = Self {
            backend,
            api_key: api_key.unwrap_or_default(),
            chat_model: chat_model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            image_model: image_model.unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            output_dir,
            history_capacity: history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("api_key", &"<redacted>")
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("output_dir", &self.output_dir)
            .field("history_capacity", &self.history_capacity)
            .finish()
    }
}

/// `~/Documents/nanobanana_generated`
pub fn default_output_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Documents").join(OUTPUT_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = Config::resolve(
            Backend::Gemini,
            Some("key".to_string()),
            None,
            None,
            Some(PathBuf::from("/tmp/out")),
            None,
        )
        .unwrap();
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.history_capacity, 10);
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = Config::resolve(
            Backend::Vertex,
            Some("  ".to_string()),
            None,
            None,
            Some(PathBuf::from("/tmp/out")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::resolve(
            Backend::Gemini,
            Some("key".to_string()),
            None,
            None,
            Some(PathBuf::from("/tmp/out")),
            Some(0),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn debug_redacts_key() {
        let config = Config::resolve(
            Backend::Gemini,
            Some("secret-key".to_string()),
            None,
            None,
            Some(PathBuf::from("/tmp/out")),
            None,
        )
        .unwrap();
        assert!(!format!("{config:?}").contains("secret-key"));
    }

    #[test]
    fn default_output_dir_name() {
        if let Some(dir) = default_output_dir() {
            assert!(dir.ends_with("Documents/nanobanana_generated"));
        }
    }
}
