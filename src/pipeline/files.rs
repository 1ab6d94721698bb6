//! Scratch storage for uploaded and unlocked PDFs.
//!
//! Two directories under the configured work dir:
//!
//! ```text
//! <work_dir>/
//!  ├─ inbound/   uploads waiting for a password   <uuid>-<name>.pdf
//!  └─ outbound/  decrypted copies before sending  unlocked_<uuid>_<name>.pdf
//! ```
//!
//! Every path handed out carries a fresh v4 UUID, so two uploads of the
//! same file name never collide and each path belongs to exactly one
//! in-flight operation. Deletion is idempotent and never fails the caller:
//! cleanup runs on error paths where there is nothing useful left to do
//! with a second error.

use crate::error::BotError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix on every decrypted output file and on the name it is sent under.
pub const UNLOCKED_PREFIX: &str = "unlocked_";

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct FileStore {
    inbound: PathBuf,
    outbound: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            inbound: root.join("inbound"),
            outbound: root.join("outbound"),
        }
    }

    pub fn inbound_dir(&self) -> &Path {
        &self.inbound
    }

    pub fn outbound_dir(&self) -> &Path {
        &self.outbound
    }

    /// Write an upload to a fresh path under `inbound/`.
    pub async fn store_inbound(
        &self,
        bytes: &Bytes,
        suggested_name: &str,
    ) -> Result<PathBuf, BotError> {
        ensure_dir(&self.inbound).await?;
        let path = self
            .inbound
            .join(format!("{}-{}", Uuid::new_v4().simple(), sanitize_name(suggested_name)));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| BotError::storage(&path, e))?;
        if let Err(e) = write_all(&mut file, bytes).await {
            drop(file);
            self.delete(&path).await;
            return Err(BotError::storage(&path, e));
        }

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Pick a fresh destination under `outbound/` for a decrypted copy.
    ///
    /// Only the path is reserved; nothing is created.
    pub async fn reserve_outbound(&self, original_name: &str) -> Result<PathBuf, BotError> {
        ensure_dir(&self.outbound).await?;
        Ok(self.outbound.join(format!(
            "{UNLOCKED_PREFIX}{}_{}",
            Uuid::new_v4().simple(),
            sanitize_name(original_name)
        )))
    }

    /// Remove a file. A missing file is fine; other errors are logged.
    pub async fn delete(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Deleted {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
        }
    }

    /// Delete scratch files last modified more than `max_age` ago.
    ///
    /// Returns how many files were removed. Missing directories count as
    /// empty.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize, BotError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for dir in [&self.inbound, &self.outbound] {
            removed += self.sweep_dir(dir, cutoff).await?;
        }
        if removed > 0 {
            info!("Swept {} stale scratch file(s)", removed);
        }
        Ok(removed)
    }

    async fn sweep_dir(&self, dir: &Path, cutoff: SystemTime) -> Result<usize, BotError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(BotError::storage(dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BotError::storage(dir, e))?
        {
            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {} during sweep: {}", path.display(), e);
                    continue;
                }
            };
            let stale = meta.modified().map(|t| t <= cutoff).unwrap_or(false);
            if stale {
                self.delete(&path).await;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), BotError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BotError::storage(dir, e))
}

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

/// Reduce a user-supplied file name to a safe single path component ending
/// in `.pdf`.
pub fn sanitize_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let mut clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if clean.len() >= 4 && clean[clean.len() - 4..].eq_ignore_ascii_case(".pdf") {
        clean.truncate(clean.len() - 4);
    }
    let clean = clean.trim_matches('.');
    let stem = if clean.is_empty() { "document" } else { clean };
    let stem: String = stem.chars().take(MAX_NAME_LEN).collect();
    format!("{stem}.pdf")
}

/// The name an unlocked copy is sent under.
pub fn unlocked_name(original_name: &str) -> String {
    format!("{UNLOCKED_PREFIX}{original_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_name("Report.PDF"), "Report.pdf");
        assert_eq!(sanitize_name("bank statement (1).pdf"), "bank_statement__1_.pdf");
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd.pdf");
        assert_eq!(sanitize_name(""), "document.pdf");
        assert_eq!(sanitize_name(".pdf"), "document.pdf");
        assert_eq!(sanitize_name("résumé.pdf"), "r_sum_.pdf");
        assert!(sanitize_name(&"a".repeat(500)).len() <= MAX_NAME_LEN + 4);
    }

    #[test]
    fn unlocked_name_prefixes() {
        assert_eq!(unlocked_name("report.pdf"), "unlocked_report.pdf");
    }

    #[tokio::test]
    async fn store_inbound_writes_unique_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let bytes = Bytes::from_static(b"%PDF-1.7 fake");

        let a = assert_ok!(store.store_inbound(&bytes, "same.pdf").await);
        let b = assert_ok!(store.store_inbound(&bytes, "same.pdf").await);

        assert_ne!(a, b);
        assert!(a.starts_with(store.inbound_dir()));
        assert!(a.to_string_lossy().ends_with("-same.pdf"));
        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn reserve_outbound_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let out = assert_ok!(store.reserve_outbound("report.pdf").await);
        assert!(out.starts_with(store.outbound_dir()));
        let file_name = out.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with(UNLOCKED_PREFIX), "got: {file_name}");
        assert!(file_name.ends_with("_report.pdf"), "got: {file_name}");
        assert!(!out.exists());
        assert!(store.outbound_dir().is_dir());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let path = store
            .store_inbound(&Bytes::from_static(b"x"), "a.pdf")
            .await
            .unwrap();

        store.delete(&path).await;
        assert!(!path.exists());
        store.delete(&path).await;
        store.delete(&dir.path().join("never-existed.pdf")).await;
    }

    #[tokio::test]
    async fn store_inbound_reports_unwritable_root() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("root-is-a-file");
        std::fs::write(&blocker, b"").unwrap();

        let store = FileStore::new(&blocker);
        let err = assert_err!(store.store_inbound(&Bytes::from_static(b"x"), "a.pdf").await);
        assert!(matches!(err, BotError::Storage { .. }));
    }

    #[tokio::test]
    async fn sweep_removes_only_old_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let bytes = Bytes::from_static(b"x");
        let inbound = store.store_inbound(&bytes, "in.pdf").await.unwrap();
        let outbound = store.reserve_outbound("out.pdf").await.unwrap();
        tokio::fs::write(&outbound, b"y").await.unwrap();

        // Nothing is an hour old yet.
        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(inbound.exists());

        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 2);
        assert!(!inbound.exists());
        assert!(!outbound.exists());
    }

    #[tokio::test]
    async fn sweep_tolerates_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("not-created"));
        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 0);
    }
}
