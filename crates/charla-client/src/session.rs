//! Local persistence of the user's phone session.
//!
//! The browser client keeps the phone in local storage under
//! `whatsapp_phone` and mirrors it into a cookie. Here it is a small file
//! in the platform data directory, and [`SessionStore::cookie`] yields the
//! matching `Cookie` header value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use charla_shared::constants::SESSION_KEY;
use charla_shared::PhoneNumber;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/whatsapp_phone`.
    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("com", "charla", "charla")
            .ok_or(ClientError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join(SESSION_KEY)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored phone, or `None` when there is no usable session.
    pub async fn get(&self) -> Result<Option<PhoneNumber>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match PhoneNumber::parse(raw.trim()) {
            Ok(phone) => Ok(Some(phone)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, phone: &PhoneNumber) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, phone.digits()).await?;
        info!(phone = %phone, "Session saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `whatsapp_phone=<digits>` for the stored session.
    pub async fn cookie(&self) -> Result<Option<String>> {
        Ok(self
            .get()
            .await?
            .map(|phone| format!("{SESSION_KEY}={}", phone.digits())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("nested").join(SESSION_KEY))
    }

    #[tokio::test]
    async fn set_get_clear() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.get().await.unwrap(), None);

        let phone = PhoneNumber::parse("11 2345 6789").unwrap();
        store.set(&phone).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(phone));
        assert_eq!(
            store.cookie().await.unwrap().as_deref(),
            Some("whatsapp_phone=5491123456789")
        );

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_no_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), "not a phone").await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }
}
