//! Dated image store
//!
//! Images land in a managed directory as `YYYY_M_D.jpg` (no zero padding),
//! one per local calendar day. A same-day rerun overwrites the earlier file.
//!
//! Bodies stream into a hidden `.part` file that is renamed into place only
//! after the whole payload is flushed, so a failed transfer never leaves a
//! file under the final name.

use crate::error::{Error, Result};
use crate::probe::PayloadStream;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// An image written to disk by this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// File name for the artifact of a given day
pub fn artifact_name(date: NaiveDate) -> String {
    format!("{}_{}_{}.jpg", date.year(), date.month(), date.day())
}

/// Directory of dated images
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stream `body` to the file for `now`'s date.
    ///
    /// Stream errors surface as the stream's own error (normally
    /// [`Error::Network`]); filesystem failures as [`Error::Persistence`].
    /// Either way the partial file is removed.
    pub async fn store(&self, body: PayloadStream, now: DateTime<Local>) -> Result<StoredArtifact> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Persistence(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let name = artifact_name(now.date_naive());
        let path = self.dir.join(&name);
        let part = self
            .dir
            .join(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()));

        let written = match write_part(&part, body).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, &path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(Error::Persistence(format!(
                "Failed to move image into {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!("Stored {} bytes at {}", written, path.display());

        Ok(StoredArtifact {
            path,
            created_at: now,
        })
    }
}

async fn write_part(part: &Path, mut body: PayloadStream) -> Result<u64> {
    let persistence = |e: std::io::Error| {
        Error::Persistence(format!("Failed to write {}: {}", part.display(), e))
    };

    let mut file = tokio::fs::File::create(part).await.map_err(persistence)?;
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(persistence)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(persistence)?;
    file.sync_all().await.map_err(persistence)?;
    Ok(written)
}
