use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::db::MatchStateStore;
use crate::error::StoreResult;
use crate::models::{LiveMatchCache, LiveMatchState};

/// In-process match store persisted to a JSON file
///
/// Used when no database is reachable. The file is read lazily on first
/// access and rewritten after every mutation, so the snapshot survives a
/// restart. A failed file write is logged and the in-memory state stays
/// authoritative.
pub struct FileMatchStore {
    path: PathBuf,
    cache: OnceCell<RwLock<LiveMatchCache>>,
}

impl FileMatchStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: OnceCell::new(),
        }
    }

    async fn cache(&self) -> &RwLock<LiveMatchCache> {
        self.cache
            .get_or_init(|| async { RwLock::new(self.load().await) })
            .await
    }

    async fn load(&self) -> LiveMatchCache {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", self.path.display());
                return LiveMatchCache::new();
            }
            Err(e) => {
                warn!("Failed to read state file {}: {}", self.path.display(), e);
                return LiveMatchCache::new();
            }
        };

        match serde_json::from_str::<Vec<LiveMatchState>>(&content) {
            Ok(matches) => {
                info!(
                    "Loaded {} live matches from {}",
                    matches.len(),
                    self.path.display()
                );
                matches.into_iter().map(|m| (m.fixture_id, m)).collect()
            }
            Err(e) => {
                warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                LiveMatchCache::new()
            }
        }
    }

    /// Write the snapshot via a temp file so readers never see a torn file
    async fn persist(&self, cache: &LiveMatchCache) {
        if let Err(e) = self.write_snapshot(cache).await {
            warn!("Failed to persist state file {}: {}", self.path.display(), e);
        }
    }

    async fn write_snapshot(&self, cache: &LiveMatchCache) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(&sorted(cache))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn sorted(cache: &LiveMatchCache) -> Vec<LiveMatchState> {
    let mut matches: Vec<LiveMatchState> = cache.values().cloned().collect();
    matches.sort_by_key(|m| m.fixture_id);
    matches
}

#[async_trait]
impl MatchStateStore for FileMatchStore {
    async fn set_matches(&self, states: &[LiveMatchState]) -> StoreResult<()> {
        if states.is_empty() {
            return Ok(());
        }

        let mut cache = self.cache().await.write().await;
        for state in states {
            cache.insert(state.fixture_id, state.clone());
        }
        self.persist(&cache).await;
        Ok(())
    }

    async fn get_match(&self, fixture_id: i64) -> StoreResult<Option<LiveMatchState>> {
        Ok(self.cache().await.read().await.get(&fixture_id).cloned())
    }

    async fn get_all_matches(&self) -> StoreResult<Vec<LiveMatchState>> {
        Ok(sorted(&*self.cache().await.read().await))
    }

    async fn remove_matches(&self, fixture_ids: &[i64]) -> StoreResult<()> {
        if fixture_ids.is_empty() {
            return Ok(());
        }

        let mut cache = self.cache().await.write().await;
        let before = cache.len();
        for fixture_id in fixture_ids {
            cache.remove(fixture_id);
        }

        if cache.len() != before {
            self.persist(&cache).await;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}
