//! Session-wide mapping from cell key to cache snapshot.

use std::collections::BTreeMap;

use geocache_core::Cell;
use geocache_system_generation::Generator;
use tracing::debug;

use crate::{
    board::Board,
    cache::Cache,
    snapshot::{self, SnapshotError},
};

/// Authoritative store of serialized caches.
///
/// Keys are [`Cell::key`] strings, the same derivation the board uses for
/// canonical identity. Entries are added or replaced, never removed.
#[derive(Clone, Debug, Default)]
pub struct CacheStore {
    entries: BTreeMap<String, String>,
}

impl CacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells with a stored snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no snapshot has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reports whether the cell has a stored snapshot.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.entries.contains_key(&cell.key())
    }

    /// Raw snapshot stored for the cell, if any.
    #[must_use]
    pub fn snapshot(&self, cell: Cell) -> Option<&str> {
        self.entries.get(&cell.key()).map(String::as_str)
    }

    /// Writes the cache's current state into the store.
    pub fn commit(&mut self, cache: &Cache) {
        debug!(cell = %cache.cell(), tokens = cache.len(), "committing cache snapshot");
        let _ = self.entries.insert(cache.cell().key(), cache.serialize());
    }

    /// Restores the cache stored for the cell without generating anything.
    ///
    /// `None` means the cell was never visited; `Some(Err(_))` means a
    /// snapshot exists but could not be decoded or describes another cell.
    pub fn load(&self, cell: Cell, board: &mut Board) -> Option<Result<Cache, SnapshotError>> {
        let stored = self.snapshot(cell)?;
        Some(restore_at(stored, cell, board))
    }

    /// Returns the cache for the cell, generating and storing it on first visit.
    ///
    /// Reading can write: when no snapshot exists the fresh cache is committed
    /// before it is returned. A corrupt snapshot is reported, not replaced;
    /// callers decide whether to fall back to [`CacheStore::regenerate`].
    pub fn load_or_create(
        &mut self,
        cell: Cell,
        board: &mut Board,
        generator: &Generator,
    ) -> Result<Cache, SnapshotError> {
        if let Some(restored) = self.load(cell, board) {
            let cache = restored?;
            debug!(cell = %cache.cell(), tokens = cache.len(), "restored cache from snapshot");
            return Ok(cache);
        }
        Ok(self.regenerate(cell, board, generator))
    }

    /// Generates fresh content for the cell and overwrites any stored snapshot.
    pub fn regenerate(&mut self, cell: Cell, board: &mut Board, generator: &Generator) -> Cache {
        let cell = board.canonical(cell);
        let cache = Cache::new(cell, generator.initial_tokens(cell));
        debug!(cell = %cell, tokens = cache.len(), "generated fresh cache");
        self.commit(&cache);
        cache
    }

    /// Full store contents as `(cell key, snapshot)` pairs in key order.
    #[must_use]
    pub fn export(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(key, snapshot)| (key.clone(), snapshot.clone()))
            .collect()
    }

    /// Reloads exported pairs, canonicalizing every key through the board.
    ///
    /// Snapshots themselves are decoded lazily on first load, so a corrupt
    /// entry surfaces when its cell is visited. Keys that do not name a cell
    /// are refused up front and nothing is imported.
    pub fn import<I>(&mut self, entries: I, board: &mut Board) -> Result<(), SnapshotError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut parsed = Vec::new();
        for (key, snapshot) in entries {
            let cell = key.parse::<Cell>().map_err(SnapshotError::InvalidCellKey)?;
            parsed.push((cell, snapshot));
        }
        for (cell, snapshot) in parsed {
            let cell = board.canonical(cell);
            let _ = self.entries.insert(cell.key(), snapshot);
        }
        Ok(())
    }
}

fn restore_at(stored: &str, cell: Cell, board: &mut Board) -> Result<Cache, SnapshotError> {
    let decoded = snapshot::decode(stored)?;
    if decoded.cell != cell {
        return Err(SnapshotError::ForeignCell {
            expected: cell,
            found: decoded.cell,
        });
    }
    Ok(Cache::new(board.canonical(decoded.cell), decoded.tokens))
}
