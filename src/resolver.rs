//! Turns image references (`last`, `history:N`, file paths) into payloads.

use crate::error::{NanoBananaError, Result};
use crate::history::{ImageHistoryStore, ImagePayload};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A reference that could not be resolved during a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FailedReference {
    pub reference: String,
    pub error: String,
}

/// Result of resolving several references: whatever succeeded, in order,
/// plus the failures.
#[derive(Debug, Default)]
pub struct ResolvedBatch {
    pub payloads: Vec<ImagePayload>,
    pub failed: Vec<FailedReference>,
}

#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    output_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl ReferenceResolver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            working_dir: None,
        }
    }

    /// Resolve relative paths against `dir` instead of the process working
    /// directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// History first, then the path as given, then the bare file name inside
    /// the output directory.
    pub async fn resolve(
        &self,
        store: &ImageHistoryStore,
        reference: &str,
    ) -> Result<ImagePayload> {
        if let Some(entry) = store.get_by_reference(reference) {
            tracing::debug!(reference, id = %entry.id, "Resolved reference from history");
            return Ok(entry.payload.clone());
        }

        let invalid = |reason: String| NanoBananaError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };

        if reference.trim().is_empty() {
            return Err(invalid("empty reference".to_string()));
        }

        let direct = self.absolutize(Path::new(reference))?;
        let first_error = match read_payload(&direct).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        if let Some(file_name) = Path::new(reference).file_name() {
            let fallback = self.output_dir.join(file_name);
            if fallback != direct {
                if let Ok(payload) = read_payload(&fallback).await {
                    tracing::debug!(
                        reference,
                        path = %fallback.display(),
                        "Resolved reference from output directory"
                    );
                    return Ok(payload);
                }
            }
        }

        Err(invalid(format!(
            "not found at {} or in {} ({})",
            direct.display(),
            self.output_dir.display(),
            first_error
        )))
    }

    /// Resolve every reference, keeping going past failures.
    pub async fn resolve_all<S: AsRef<str>>(
        &self,
        store: &ImageHistoryStore,
        references: &[S],
    ) -> ResolvedBatch {
        let mut batch = ResolvedBatch::default();
        for reference in references {
            let reference = reference.as_ref();
            match self.resolve(store, reference).await {
                Ok(payload) => batch.payloads.push(payload),
                Err(e) => {
                    tracing::warn!(reference, error = %e, "Skipping unresolvable image reference");
                    batch.failed.push(FailedReference {
                        reference: reference.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        batch
    }

    fn absolutize(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let base = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(base.join(path))
    }
}

async fn read_payload(path: &Path) -> std::io::Result<ImagePayload> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ImagePayload {
        data_base64: STANDARD.encode(bytes),
        mime_type: mime_type_for(path).to_string(),
    })
}

/// MIME type guessed from the file extension; PNG when unknown.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("a.png")), "image/png");
        assert_eq!(mime_type_for(Path::new("noext")), "image/png");
    }

    #[tokio::test]
    async fn empty_reference_is_invalid() {
        let resolver = ReferenceResolver::new("/nonexistent-output");
        let err = resolver
            .resolve(&ImageHistoryStore::default(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, NanoBananaError::InvalidReference { .. }));
    }
}
