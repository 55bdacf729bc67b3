//! Where a finished archive goes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Destination for a finished archive
#[async_trait]
pub trait SaveSink: Send + Sync {
    /// Store `bytes` under (a variant of) `file_name`, returning where it landed
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}

/// [`SaveSink`] writing archives into a local directory
///
/// An existing file is never overwritten; the name gets a ` (n)` suffix instead.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Save into `dir`, created on first use
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn unique_path(&self, file_name: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(file_name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let extension = path.extension().and_then(|e| e.to_str());

        for i in 1..10_000 {
            let name = match extension {
                Some(ext) => format!("{} ({}).{}", stem, i, ext),
                None => format!("{} ({})", stem, i),
            };
            let candidate = self.dir.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Err(crate::error::Error::Other(format!(
            "could not find a free file name for {} in {}",
            file_name,
            self.dir.display()
        )))
    }
}

#[async_trait]
impl SaveSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.unique_path(file_name).await?;
        tokio::fs::write(&target, &bytes).await?;

        tracing::info!(path = %target.display(), bytes = bytes.len(), "archive saved");
        Ok(target.display().to_string())
    }
}
