use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{BlobStore, BlobStoreError};
use crate::names::is_safe_name;

const TEMP_PREFIX: &str = ".upload-";

/// Media files stored directly in one directory, file name = media name.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BlobStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!("Media files stored in {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, BlobStoreError> {
        if !is_safe_name(name) {
            return Err(BlobStoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn temp_path(&self) -> PathBuf {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        self.root.join(format!("{}{}", TEMP_PREFIX, suffix))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<String, BlobStoreError> {
        let target = self.checked_path(name)?;
        if data.is_empty() {
            return Err(BlobStoreError::Empty);
        }

        // Write aside then rename, so a listed file is always complete.
        let temp = self.temp_path();
        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp, &target).await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }

        debug!("Stored {} ({} bytes)", name, data.len());
        Ok(name.to_string())
    }

    async fn list(&self) -> Result<Vec<String>, BlobStoreError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<(), BlobStoreError> {
        let path = self.checked_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", name);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
