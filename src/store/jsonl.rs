//! Append-only JSON-lines file store.
//!
//! One observation per line. Reads scan the whole file, which is fine for
//! the volumes a personal price monitor produces.

use super::{ObservationStore, StoreError};
use crate::models::{PriceObservation, ProductId};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<PriceObservation>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PriceObservation>(line) {
                Ok(row) => rows.push(row),
                // A crash mid-write can leave a torn last line.
                Err(e) => {
                    warn!("Skipping unreadable line {} in {}: {}", n + 1, self.path.display(), e)
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl ObservationStore for JsonlStore {
    async fn append_observation(&self, observation: &PriceObservation) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(observation)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file =
            OpenOptions::new().create(true).read(true).append(true).open(&self.path).await?;

        // Terminate a torn last line so this row starts on its own line.
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                warn!("Terminating torn last line in {}", self.path.display());
                line.insert(0, '\n');
            }
        }

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended observation for {} to {}", observation.product_id, self.path.display());
        Ok(())
    }

    async fn read_history(&self, id: &ProductId) -> Result<Vec<PriceObservation>, StoreError> {
        let mut history: Vec<_> =
            self.read_all().await?.into_iter().filter(|o| &o.product_id == id).collect();
        history.sort_by_key(|o| o.observed_at);
        Ok(history)
    }
}
