//! In-process stores for dry runs and tests.

use super::{DocumentStore, FileStore, StoredFile};
use crate::Result;
use async_trait::async_trait;
use chess_archive_core::{Game, GameFile};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Document store held in a map keyed by game ID.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, Game>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Game> {
        self.docs.lock().get(id).cloned()
    }

    /// Snapshot of all stored games, sorted by ID.
    pub fn games(&self) -> Vec<Game> {
        let mut games: Vec<Game> = self.docs.lock().values().cloned().collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upsert(&self, game: &Game) -> Result<String> {
        self.docs.lock().insert(game.id.clone(), game.clone());
        Ok(game.id.clone())
    }

    async fn latest(&self) -> Result<Option<Game>> {
        Ok(self
            .docs
            .lock()
            .values()
            .max_by(|a, b| a.played_at.cmp(&b.played_at).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }
}

/// A file captured by [`MemoryFileStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub folder: String,
    pub file: GameFile,
    pub stored: StoredFile,
}

#[derive(Debug, Default)]
struct FileLog {
    files: Vec<MemoryFile>,
    next_id: u64,
}

/// Append-only file store kept in a vector.
///
/// "Newest" follows the `played_at` metadata, falling back to creation order
/// on ties.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    log: Mutex<FileLog>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().files.is_empty()
    }

    /// All created files in creation order.
    pub fn files(&self) -> Vec<MemoryFile> {
        self.log.lock().files.clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create(
        &self,
        folder: &str,
        file: &GameFile,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut log = self.log.lock();
        log.next_id += 1;
        let seq = log.next_id;
        let id = format!("mem-{seq}");

        log.files.push(MemoryFile {
            folder: folder.to_string(),
            file: file.clone(),
            stored: StoredFile {
                id: id.clone(),
                name: file.name.clone(),
                metadata: metadata.clone(),
            },
        });

        Ok(id)
    }

    async fn newest_in_folder(&self, folder: &str) -> Result<Option<StoredFile>> {
        Ok(self
            .log
            .lock()
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.folder == folder)
            .max_by_key(|(seq, f)| (played_at(&f.stored.metadata), *seq))
            .map(|(_, f)| f.stored.clone()))
    }
}

fn played_at(metadata: &BTreeMap<String, String>) -> Option<i64> {
    metadata.get("played_at").and_then(|v| v.parse().ok())
}
