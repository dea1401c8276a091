//! Integration tests for turning image references into payloads.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use nanobanana_mcp::{
    ImageHistoryEntry, ImageHistoryStore, ImagePayload, NanoBananaError, Provenance,
    ReferenceResolver,
};
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    cwd: TempDir,
    output: TempDir,
    resolver: ReferenceResolver,
}

fn fixture() -> Fixture {
    let cwd = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let resolver = ReferenceResolver::new(output.path()).with_working_dir(cwd.path());
    Fixture { cwd, output, resolver }
}

fn history_entry(tag: &str) -> ImageHistoryEntry {
    ImageHistoryEntry::new(
        PathBuf::from("/does/not/exist.png"),
        ImagePayload {
            data_base64: format!("history-{tag}"),
            mime_type: "image/webp".to_string(),
        },
        tag,
        Provenance::Generated,
    )
}

#[tokio::test]
async fn test_history_reference_needs_no_file() {
    let fx = fixture();
    let mut store = ImageHistoryStore::default();
    store.append(history_entry("a"));
    store.append(history_entry("b"));

    let last = fx.resolver.resolve(&store, "last").await.unwrap();
    assert_eq!(last.data_base64, "history-b");
    assert_eq!(last.mime_type, "image/webp");

    let first = fx.resolver.resolve(&store, "history:0").await.unwrap();
    assert_eq!(first.data_base64, "history-a");
}

#[tokio::test]
async fn test_relative_path_reads_from_working_dir() {
    let fx = fixture();
    std::fs::write(fx.cwd.path().join("photo.jpg"), b"jpeg-bytes").unwrap();

    let payload = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), "photo.jpg")
        .await
        .unwrap();
    assert_eq!(payload.mime_type, "image/jpeg");
    assert_eq!(STANDARD.decode(payload.data_base64).unwrap(), b"jpeg-bytes");
}

#[tokio::test]
async fn test_absolute_path_is_read_directly() {
    let fx = fixture();
    let path = fx.cwd.path().join("abs.png");
    std::fs::write(&path, b"png").unwrap();

    let payload = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), path.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(STANDARD.decode(payload.data_base64).unwrap(), b"png");
}

#[tokio::test]
async fn test_bare_filename_falls_back_to_output_dir() {
    let fx = fixture();
    std::fs::write(fx.output.path().join("generated_1.png"), b"from-output").unwrap();

    let payload = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), "generated_1.png")
        .await
        .unwrap();
    assert_eq!(STANDARD.decode(payload.data_base64).unwrap(), b"from-output");
}

#[tokio::test]
async fn test_stale_directory_falls_back_to_output_dir_by_basename() {
    let fx = fixture();
    std::fs::write(fx.output.path().join("edited_2.png"), b"moved").unwrap();

    let payload = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), "old/location/edited_2.png")
        .await
        .unwrap();
    assert_eq!(STANDARD.decode(payload.data_base64).unwrap(), b"moved");
}

#[tokio::test]
async fn test_missing_file_is_invalid_reference() {
    let fx = fixture();
    let err = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), "nowhere.png")
        .await
        .unwrap_err();

    match err {
        NanoBananaError::InvalidReference { reference, .. } => assert_eq!(reference, "nowhere.png"),
        other => panic!("Expected InvalidReference, got {other:?}"),
    }
}

#[tokio::test]
async fn test_symbolic_reference_on_empty_history_is_invalid() {
    let fx = fixture();
    for reference in ["last", "history:0", "history:-1", "history:"] {
        let err = fx
            .resolver
            .resolve(&ImageHistoryStore::default(), reference)
            .await
            .unwrap_err();
        assert!(matches!(err, NanoBananaError::InvalidReference { .. }), "{reference}");
        assert!(err.to_string().contains("history:N"));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_malformed_history_reference_can_be_a_file_name() {
    let fx = fixture();
    std::fs::write(fx.cwd.path().join("history:x"), b"odd-name").unwrap();

    let payload = fx
        .resolver
        .resolve(&ImageHistoryStore::default(), "history:x")
        .await
        .unwrap();
    assert_eq!(STANDARD.decode(payload.data_base64).unwrap(), b"odd-name");
}

#[tokio::test]
async fn test_batch_keeps_successes_and_reports_failures() {
    let fx = fixture();
    std::fs::write(fx.cwd.path().join("a.png"), b"a").unwrap();
    std::fs::write(fx.output.path().join("b.png"), b"b").unwrap();
    let mut store = ImageHistoryStore::default();
    store.append(history_entry("h"));

    let refs = vec![
        "a.png".to_string(),
        "missing-1.png".to_string(),
        "last".to_string(),
        "history:5".to_string(),
        "b.png".to_string(),
    ];
    let batch = fx.resolver.resolve_all(&store, &refs).await;

    assert_eq!(batch.payloads.len(), 3);
    assert_eq!(batch.payloads[1].data_base64, "history-h");
    let failed: Vec<&str> = batch.failed.iter().map(|f| f.reference.as_str()).collect();
    assert_eq!(failed, vec!["missing-1.png", "history:5"]);
}
