//! Active dataset selection
//!
//! The active dataset path lives behind an `RwLock` cell shared by the
//! `set_stream` handler and the batch writer. The writer reads the cell at
//! every flush, so a session switch takes effect on the next flush.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatmood_common::{time, video, Result};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ActiveDataset {
    data_dir: PathBuf,
    current: Arc<RwLock<PathBuf>>,
}

impl ActiveDataset {
    pub fn new(data_dir: impl Into<PathBuf>, initial: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            current: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path the next flush will append to
    pub async fn current(&self) -> PathBuf {
        self.current.read().await.clone()
    }

    /// Point the dataset cell at `path`, returning the previous value
    pub async fn switch_to(&self, path: PathBuf) -> PathBuf {
        let mut current = self.current.write().await;
        std::mem::replace(&mut *current, path)
    }

    /// Create the data directory and name a new session file for `video_id`
    ///
    /// `<data_dir>/chat_<video_id>_<YYYYMMDD_HHMMSS>.csv`; nothing is switched yet.
    pub async fn prepare_session(&self, video_id: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let file_name = video::session_file_name(video_id, &time::session_stamp());
        Ok(self.data_dir.join(file_name))
    }

    /// Make `path` the active dataset
    pub async fn activate(&self, path: PathBuf) {
        let previous = self.switch_to(path.clone()).await;
        info!(
            previous = %previous.display(),
            "Now saving chats to → {}",
            path.display()
        );
    }

    /// Begin a new session for `video_id`
    pub async fn start_session(&self, video_id: &str) -> Result<PathBuf> {
        let path = self.prepare_session(video_id).await?;
        self.activate(path.clone()).await;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_session_switches_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let dataset = ActiveDataset::new(&data_dir, data_dir.join("chat_data.csv"));

        let path = dataset.start_session("ABC123").await.unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(dataset.current().await, path);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("chat_ABC123_"), "{name}");
        assert!(name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn test_clones_share_the_cell() {
        let dataset = ActiveDataset::new("data", "data/a.csv");
        let other = dataset.clone();
        let previous = other.switch_to(PathBuf::from("data/b.csv")).await;
        assert_eq!(previous, PathBuf::from("data/a.csv"));
        assert_eq!(dataset.current().await, PathBuf::from("data/b.csv"));
    }
}
