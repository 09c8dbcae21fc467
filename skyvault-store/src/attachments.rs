use std::path::{Path, PathBuf};

use chrono::Utc;
use skyvault_core::{DocumentRef, TicketError, TicketResult};
use tracing::info;
use uuid::Uuid;

use crate::app_config::AttachmentConfig;

/// Writes supporting documents to disk.
///
/// Files are written before any ticket references them, so a failed write
/// never leaves a dangling reference behind.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &AttachmentConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> TicketResult<DocumentRef> {
        let name = original_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(TicketError::validation(format!(
                "invalid attachment name '{}'",
                original_name
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TicketError::Persistence(e.to_string()))?;

        let unique = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &unique[..8], name);
        tokio::fs::write(self.dir.join(&file_name), bytes)
            .await
            .map_err(|e| TicketError::Persistence(e.to_string()))?;

        info!("Attachment stored: {} ({} bytes)", file_name, bytes.len());
        Ok(DocumentRef(file_name))
    }

    pub fn path_of(&self, document: &DocumentRef) -> PathBuf {
        self.dir.join(document.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_before_returning_ref() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path().join("attachments"));

        let doc = store.save("boarding.pdf", b"%PDF-1.4").await.unwrap();

        assert!(doc.as_str().ends_with("_boarding.pdf"));
        let written = tokio::fs::read(store.path_of(&doc)).await.unwrap();
        assert_eq!(written, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_same_name_twice_gets_distinct_refs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());

        let a = store.save("receipt.png", b"a").await.unwrap();
        let b = store.save("receipt.png", b"b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());

        for bad in ["", "  ", "../etc/passwd", "a\\b.pdf", ".."] {
            assert!(matches!(
                store.save(bad, b"x").await,
                Err(TicketError::Validation(_))
            ));
        }
    }
}
