//! Persisted change token
//!
//! The state file holds exactly the last seen token as plain text. A missing
//! file means the resource has never been checked.

use crate::error::{Error, Result};
use crate::probe::ChangeToken;
use std::path::{Path, PathBuf};

/// Last seen change token on disk
#[derive(Debug, Clone)]
pub struct LocalState {
    path: PathBuf,
}

impl LocalState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token, `None` when the file does not exist yet
    pub async fn read(&self) -> Result<Option<ChangeToken>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(ChangeToken::from(token)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Replace the stored token.
    ///
    /// The token is written to a sibling temp file and renamed into place.
    pub async fn write(&self, token: &ChangeToken) -> Result<()> {
        let tmp = self.tmp_path();

        if let Err(e) = tokio::fs::write(&tmp, token.as_str()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Persistence(format!(
                "Failed to write {}: {}",
                tmp.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Persistence(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::debug!("Recorded change token {} in {}", token, self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
