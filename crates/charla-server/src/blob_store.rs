use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerError;

/// Folders a file may be uploaded into.
pub const FOLDERS: [&str; 4] = ["uploads", "adminStatuses", "adminProfile", "users"];

/// Folders a user session may upload into. The rest belong to the admin.
pub const USER_FOLDERS: [&str; 2] = ["uploads", "users"];

/// Folder used when the upload form does not name one.
pub const DEFAULT_FOLDER: &str = "uploads";

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// A file written by [`BlobStore::store_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub folder: String,
    /// Stored name, `{millis}_{sanitized original}`.
    pub name: String,
    pub size: usize,
    pub content_type: &'static str,
}

/// Folder-scoped file storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for folder in FOLDERS {
            let dir = base_path.join(folder);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::FileStorage(format!(
                    "Failed to create directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "File store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn store_file(
        &self,
        folder: &str,
        original_name: &str,
        data: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredFile, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::FileTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let name = format!(
            "{}_{}",
            now.timestamp_millis(),
            sanitize_filename(original_name)
        );
        let path = self.file_path(folder, &name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::FileStorage(format!("Failed to write {folder}/{name}: {e}"))
        })?;

        debug!(folder, name = %name, size = data.len(), "Stored file");
        Ok(StoredFile {
            folder: folder.to_string(),
            content_type: content_type_for(&name),
            name,
            size: data.len(),
        })
    }

    pub async fn read_file(&self, folder: &str, name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.file_path(folder, name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("File not found: {folder}/{name}")));
        }

        fs::read(&path)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to read {folder}/{name}: {e}")))
    }

    pub async fn delete_file(&self, folder: &str, name: &str) -> Result<(), ServerError> {
        let path = self.file_path(folder, name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("File not found: {folder}/{name}")));
        }

        fs::remove_file(&path).await.map_err(|e| {
            ServerError::FileStorage(format!("Failed to delete {folder}/{name}: {e}"))
        })?;

        debug!(folder, name, "Deleted file");
        Ok(())
    }

    /// Delete the file behind one of our own `/api/files/{folder}/{name}`
    /// URLs. URLs pointing elsewhere are ignored.
    pub async fn delete_by_url(&self, url: &str) -> Result<bool, ServerError> {
        let Some((folder, name)) = parse_file_url(url) else {
            return Ok(false);
        };
        match self.delete_file(folder, name).await {
            Ok(()) => Ok(true),
            Err(ServerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Safe path for `folder/name`, rejecting unknown folders and traversal.
    fn file_path(&self, folder: &str, name: &str) -> Result<PathBuf, ServerError> {
        if !FOLDERS.contains(&folder) {
            return Err(ServerError::BadRequest(format!("Unknown folder: {folder}")));
        }
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ServerError::BadRequest("Path traversal detected".to_string()));
        }
        let target = self.base_path.join(folder).join(name);
        ensure_within(&self.base_path, &target)
    }
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers may send a full client-side path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.replace("..", "_")
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Split `.../api/files/{folder}/{name}` into its folder and name.
pub fn parse_file_url(url: &str) -> Option<(&str, &str)> {
    let (_, rest) = url.split_once("/api/files/")?;
    let (folder, name) = rest.split_once('/')?;
    (!folder.is_empty() && !name.is_empty()).then_some((folder, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_read() {
        let (store, _dir) = test_store().await;

        let stored = store
            .store_file("uploads", "Foto de perfil.PNG", b"png-bytes", now())
            .await
            .unwrap();
        assert_eq!(stored.name, format!("{}_Foto_de_perfil.PNG", now().timestamp_millis()));
        assert_eq!(stored.content_type, "image/png");

        let data = store.read_file("uploads", &stored.name).await.unwrap();
        assert_eq!(data, b"png-bytes");
    }

    #[tokio::test]
    async fn test_delete_by_url() {
        let (store, _dir) = test_store().await;
        let stored = store
            .store_file("adminStatuses", "promo.jpg", b"jpg", now())
            .await
            .unwrap();

        let url = format!("https://chat.example.com/api/files/adminStatuses/{}", stored.name);
        assert!(store.delete_by_url(&url).await.unwrap());
        assert!(!store.delete_by_url(&url).await.unwrap());
        assert!(!store.delete_by_url("https://cdn.example.com/x.jpg").await.unwrap());
        assert!(store.read_file("adminStatuses", &stored.name).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_unknown_folder() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.read_file("uploads", "../secret").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.read_file("..", "x").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.store_file("backups", "a.txt", b"x", now()).await,
            Err(ServerError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_size_limits() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 4).await.unwrap();
        assert!(matches!(
            store.store_file("uploads", "a.txt", b"", now()).await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.store_file("uploads", "a.txt", b"12345", now()).await,
            Err(ServerError::FileTooLarge { size: 5, max: 4 })
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("C:\\Users\\ana\\factura 1.pdf"), "factura_1.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(".env"), "env");
        assert_eq!(sanitize_filename("año.txt"), "a_o.txt");
        assert_eq!(sanitize_filename(""), "file");
    }
}
