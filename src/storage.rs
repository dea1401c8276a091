//! Writes generated images to the output directory.

use crate::error::{NanoBananaError, Result};
use crate::history::{ImagePayload, Provenance};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ImageSaver {
    output_dir: PathBuf,
}

impl ImageSaver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save `payload` as `<provenance>_<timestamp>_<id>.<ext>` and return the
    /// full path.
    pub async fn save(&self, payload: &ImagePayload, provenance: Provenance) -> Result<PathBuf> {
        let bytes = STANDARD.decode(&payload.data_base64).map_err(|e| {
            NanoBananaError::UpstreamGenerationFailure(format!("image data is not valid base64: {e}"))
        })?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}_{}.{}",
            provenance.as_str(),
            Local::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8],
            extension_for(&payload.mime_type)
        );
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(path = %path.display(), "Saved image");
        Ok(path)
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let saver = ImageSaver::new(dir.path().join("nested").join("out"));
        let payload = ImagePayload {
            data_base64: STANDARD.encode(b"fake-jpeg"),
            mime_type: "image/jpeg".to_string(),
        };

        let path = saver.save(&payload, Provenance::Edited).await.unwrap();

        assert!(path.starts_with(saver.output_dir()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("edited_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"fake-jpeg");
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let saver = ImageSaver::new(dir.path());
        let payload = ImagePayload {
            data_base64: "not base64!!".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(saver.save(&payload, Provenance::Generated).await.is_err());
    }
}
