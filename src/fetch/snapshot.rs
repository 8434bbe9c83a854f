use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Metadata sidecar written next to each snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub url: String,
    pub fetched_at: String,
    pub http_status: u16,
    pub content_type: Option<String>,
    pub content_hash: String,
}

/// Content-addressed store for fetched HTML
///
/// Each page body is written as `{sha256}.html` with a `{sha256}.json`
/// metadata sidecar. Identical content shares one file; writes are
/// skipped when the hash is already present, so re-crawls and 304
/// revalidations never duplicate storage.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Opens (or creates) a snapshot directory
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// SHA-256 of a page body, hex encoded
    pub fn content_hash(body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    /// Whether a snapshot with this hash is already stored
    pub fn contains(&self, content_hash: &str) -> bool {
        self.dir.join(format!("{}.html", content_hash)).exists()
    }

    /// Stores a body and its metadata, returning the snapshot reference
    ///
    /// A snapshot that already exists for this hash is left untouched.
    pub fn store(&self, body: &str, meta: &SnapshotMeta) -> crate::Result<String> {
        let html_name = format!("{}.html", meta.content_hash);
        let html_path = self.dir.join(&html_name);

        if !html_path.exists() {
            std::fs::write(&html_path, body)?;
            let meta_path = self.dir.join(format!("{}.json", meta.content_hash));
            let meta_json = serde_json::to_string_pretty(meta)?;
            std::fs::write(meta_path, meta_json)?;
        }

        Ok(html_name)
    }

    /// Reads a stored page body back by snapshot reference
    pub fn read_html(&self, snapshot_ref: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.dir.join(snapshot_ref))
    }

    /// Reads the metadata sidecar for a snapshot reference
    pub fn read_meta(&self, snapshot_ref: &str) -> crate::Result<SnapshotMeta> {
        let hash = snapshot_ref.trim_end_matches(".html");
        let content = std::fs::read_to_string(self.dir.join(format!("{}.json", hash)))?;
        Ok(serde_json::from_str(&content)?)
    }
}
