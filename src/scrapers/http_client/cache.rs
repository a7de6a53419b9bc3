//! On-disk response cache keyed by URL hash.

use std::io;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Stores successful response bodies at `{dir}/{hash[0..2]}/{hash}`.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the cache entry for a URL.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(url.as_bytes()));
        self.dir.join(&hash[..2]).join(&hash)
    }

    pub async fn get(&self, url: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(url)).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn put(&self, url: &str, body: &str) -> io::Result<()> {
        let path = self.path_for(url);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, body).await
    }

    /// Drop the entry for a URL. Missing entries are not an error.
    pub async fn remove(&self, url: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(url)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
