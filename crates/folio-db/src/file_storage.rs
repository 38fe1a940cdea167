//! Upload store on the local filesystem.
//!
//! Image records hold a relative storage path such as
//! `uploads/alice/holiday_k3J9x0aQm2LpZ7tB.png`; the backend resolves it
//! under its base directory. The same directory is served at `/storage`.

use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use folio_core::defaults::{STORAGE_URL_PREFIX, UPLOAD_DIR, UPLOAD_RANDOM_SUFFIX_LEN};
use folio_core::{clean_file_stem, storage_extension, Result};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend rooted at `base_path`.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Run at startup so permission problems surface before the first upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join("probe.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(
            subsystem = "storage",
            op = "write",
            storage_path = %path,
            size = data.len(),
            "Writing upload"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(subsystem = "storage", parent = %parent.display(), error = %e, "create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(
                subsystem = "storage",
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "rename failed"
            );
            e
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.full_path(path)).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }
}

fn random_suffix(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn safe_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

/// Relative storage path for a new upload by `username`.
///
/// Format: `uploads/{username}/{clean_stem}_{random16}.{ext}`.
pub fn upload_path(username: &str, filename: &str, data: &[u8]) -> String {
    format!(
        "{}/{}/{}_{}.{}",
        UPLOAD_DIR,
        safe_segment(username),
        clean_file_stem(filename),
        random_suffix(UPLOAD_RANDOM_SUFFIX_LEN),
        storage_extension(filename, data)
    )
}

/// Public URL of a stored file, e.g. `https://host/storage/uploads/...`.
pub fn public_url(public_base: &str, storage_path: &str) -> String {
    format!(
        "{}{}/{}",
        public_base.trim_end_matches('/'),
        STORAGE_URL_PREFIX,
        storage_path.trim_start_matches('/')
    )
}

/// Remove backing files after their records are gone.
///
/// Failures are logged and skipped; the database is the source of truth.
pub async fn delete_files_best_effort(backend: &dyn StorageBackend, paths: &[String]) -> usize {
    let mut deleted = 0;
    for path in paths {
        match backend.delete(path).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!(
                subsystem = "storage",
                op = "delete",
                storage_path = %path,
                error = %e,
                "Failed to delete stored file; record already removed"
            ),
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_path_shape() {
        let path = upload_path("alice", "My Holiday.PNG", b"\x89PNG\r\n\x1a\n");
        assert!(path.starts_with("uploads/alice/My_Holiday_"));
        assert!(path.ends_with(".png"));
        let suffix = path
            .trim_start_matches("uploads/alice/My_Holiday_")
            .trim_end_matches(".png");
        assert_eq!(suffix.len(), UPLOAD_RANDOM_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_upload_path_keeps_dotted_username() {
        let path = upload_path("john.doe", "x.gif", b"");
        assert!(path.starts_with("uploads/john_doe/x_"));
    }

    #[test]
    fn test_upload_paths_differ() {
        let a = upload_path("bob", "a.jpg", b"");
        let b = upload_path("bob", "a.jpg", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:3000/", "uploads/a/x.png"),
            "http://localhost:3000/storage/uploads/a/x.png"
        );
        assert_eq!(public_url("", "/uploads/a/x.png"), "/storage/uploads/a/x.png");
    }

    #[tokio::test]
    async fn test_filesystem_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = "uploads/carol/pic_abc.png";

        backend.write(path, b"data").await.unwrap();
        assert!(backend.exists(path).await.unwrap());
        assert_eq!(backend.read(path).await.unwrap(), b"data");

        backend.delete(path).await.unwrap();
        assert!(!backend.exists(path).await.unwrap());
        // Deleting again is a no-op.
        backend.delete(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_probe() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path().join("store"));
        assert!(backend.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_best_effort_delete_counts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.write("uploads/d/one.png", b"1").await.unwrap();
        let deleted = delete_files_best_effort(
            &backend,
            &["uploads/d/one.png".to_string(), "uploads/d/missing.png".to_string()],
        )
        .await;
        assert_eq!(deleted, 2);
    }
}
