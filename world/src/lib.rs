#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the geocache game.
//!
//! The [`World`] is the session object: it owns the canonical cell registry
//! ([`Board`]), the snapshot store ([`CacheStore`]), the caches currently in
//! the player's neighborhood and the player's holdings. Adapters mutate it
//! only through [`apply`] and read it only through [`query`].

pub mod board;
pub mod cache;
pub mod snapshot;
pub mod store;

use std::collections::{BTreeMap, BTreeSet};

use geocache_core::{
    Cell, Command, ConfigError, Event, GeoPoint, ParseIdentityError, Token, TransferError,
    WorldConfig,
};
use geocache_system_generation::Generator;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use board::Board;
pub use cache::Cache;
pub use snapshot::SnapshotError;
pub use store::CacheStore;

/// Represents the authoritative geocache world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    board: Board,
    store: CacheStore,
    generator: Generator,
    player: GeoPoint,
    holdings: Vec<Token>,
    visible: BTreeMap<Cell, Cache>,
}

impl World {
    /// Creates an empty world with the player standing at the configured origin.
    ///
    /// No caches are visible until the first movement command is applied.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        let generator = Generator::new(&config)?;
        let board = Board::new(config.tile_size)?;
        Ok(Self {
            player: config.origin,
            config,
            board,
            store: CacheStore::new(),
            generator,
            holdings: Vec::new(),
            visible: BTreeMap::new(),
        })
    }

    /// Rebuilds a world from an export produced by [`World::export`].
    ///
    /// Every token must live in exactly one place: a token listed twice in
    /// the holdings, or both held and stored in a readable snapshot, is
    /// refused. Unreadable snapshots are left for the survey to discard.
    pub fn restore(config: WorldConfig, export: WorldExport) -> Result<Self, WorldError> {
        let mut world = Self::new(config)?;
        world.store.import(export.entries, &mut world.board)?;
        world.holdings = export
            .holdings
            .iter()
            .map(|identity| identity.parse::<Token>())
            .collect::<Result<_, _>>()?;

        let mut seen = BTreeSet::new();
        for token in &world.holdings {
            if !seen.insert(*token) {
                return Err(WorldError::DuplicateToken(*token));
            }
        }
        for (_, stored) in world.store.export() {
            let Ok(decoded) = snapshot::decode(&stored) else {
                continue;
            };
            for token in decoded.tokens {
                if !seen.insert(token) {
                    return Err(WorldError::DuplicateToken(token));
                }
            }
        }

        world.player = export.player;
        Ok(world)
    }

    /// Captures total game state: every stored snapshot, the holdings and the player position.
    #[must_use]
    pub fn export(&self) -> WorldExport {
        WorldExport {
            entries: self.store.export(),
            holdings: self.holdings.iter().map(Token::to_string).collect(),
            player: self.player,
        }
    }

    fn move_player(&mut self, to: GeoPoint, out_events: &mut Vec<Event>) {
        let from = self.player;
        self.player = to;
        out_events.push(Event::PlayerMoved { from, to });
        self.survey(out_events);
    }

    fn survey(&mut self, out_events: &mut Vec<Event>) {
        let radius = self.config.radius_in_tiles();
        let nearby: BTreeSet<Cell> = self
            .board
            .cells_within_radius(self.player, radius)
            .into_iter()
            .filter(|cell| self.generator.exists_at(*cell))
            .collect();

        let departed: Vec<Cell> = self
            .visible
            .keys()
            .copied()
            .filter(|cell| !nearby.contains(cell))
            .collect();
        for cell in departed {
            if let Some(cache) = self.visible.remove(&cell) {
                self.store.commit(&cache);
                out_events.push(Event::CacheHidden { cell });
            }
        }

        for cell in nearby {
            if self.visible.contains_key(&cell) {
                continue;
            }
            let cache = match self
                .store
                .load_or_create(cell, &mut self.board, &self.generator)
            {
                Ok(cache) => cache,
                Err(error) => {
                    warn!(cell = %cell, %error, "discarding unreadable cache snapshot");
                    out_events.push(Event::SnapshotDiscarded {
                        cell,
                        reason: error.to_string(),
                    });
                    self.store
                        .regenerate(cell, &mut self.board, &self.generator)
                }
            };
            out_events.push(Event::CacheRevealed {
                cell,
                tokens: cache.len(),
            });
            let _ = self.visible.insert(cell, cache);
        }
    }

    fn collect(&mut self, cell: Cell, token: Option<Token>) -> Result<Token, TransferError> {
        let cache = self.visible.get_mut(&cell).ok_or(TransferError::NoCache)?;
        let taken = match token {
            Some(token) => cache
                .remove_token(token)
                .ok_or(TransferError::TokenNotFound)?,
            None => cache.pop_token().ok_or(TransferError::Empty)?,
        };
        self.holdings.push(taken);
        self.store.commit(cache);
        Ok(taken)
    }

    fn deposit(&mut self, cell: Cell, token: Option<Token>) -> Result<Token, TransferError> {
        let cache = self.visible.get_mut(&cell).ok_or(TransferError::NoCache)?;
        let given = match token {
            Some(token) => {
                let index = self
                    .holdings
                    .iter()
                    .position(|held| *held == token)
                    .ok_or(TransferError::TokenNotFound)?;
                self.holdings.remove(index)
            }
            None => self.holdings.pop().ok_or(TransferError::Empty)?,
        };
        cache.add_token(given);
        self.store.commit(cache);
        Ok(given)
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::MovePlayer { to } => world.move_player(to, out_events),
        Command::StepPlayer { direction } => {
            let (rows, cols) = direction.offset();
            let tile = world.board.tile_size();
            let to = world
                .player
                .offset(rows as f64 * tile, cols as f64 * tile);
            world.move_player(to, out_events);
        }
        Command::CollectToken { cell, token } => match world.collect(cell, token) {
            Ok(token) => out_events.push(Event::TokenCollected { cell, token }),
            Err(reason) => out_events.push(Event::TransferRejected { cell, reason }),
        },
        Command::DepositToken { cell, token } => match world.deposit(cell, token) {
            Ok(token) => out_events.push(Event::TokenDeposited { cell, token }),
            Err(reason) => out_events.push(Event::TransferRejected { cell, reason }),
        },
    }
}

/// Total game state in a form suitable for durable storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldExport {
    /// Every stored `(cell key, snapshot)` pair.
    pub entries: Vec<(String, String)>,
    /// Token identities held by the player, oldest first.
    pub holdings: Vec<String>,
    /// Last known player location.
    pub player: GeoPoint,
}

/// Failures raised while building a world from configuration or an export.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The configuration was refused.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A store key could not be canonicalized.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A held token identity could not be parsed.
    #[error(transparent)]
    Holding(#[from] ParseIdentityError),
    /// The same token was found in more than one container.
    #[error("token {0} is recorded in more than one place")]
    DuplicateToken(Token),
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use geocache_core::{Cell, GeoPoint, Region, Token, WorldConfig};
    use geocache_system_generation::Generator;

    use super::{Board, Cache, CacheStore, World};
    use crate::snapshot::{self, SnapshotError};

    /// Configuration the world was built with.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Current player location.
    #[must_use]
    pub fn player(world: &World) -> GeoPoint {
        world.player
    }

    /// Tokens held by the player, oldest first.
    #[must_use]
    pub fn holdings(world: &World) -> &[Token] {
        &world.holdings
    }

    /// Caches currently in the player's neighborhood, ordered by cell.
    pub fn visible_caches(world: &World) -> impl Iterator<Item = &Cache> {
        world.visible.values()
    }

    /// Visible cache at the cell, if any.
    #[must_use]
    pub fn cache(world: &World, cell: Cell) -> Option<&Cache> {
        world.visible.get(&cell)
    }

    /// Coordinate-space rectangle covered by the cell.
    #[must_use]
    pub fn bounds_of(world: &World, cell: Cell) -> Region {
        world.board.bounds_of(cell)
    }

    /// Read-only access to the canonical cell registry.
    #[must_use]
    pub fn board(world: &World) -> &Board {
        &world.board
    }

    /// Read-only access to the snapshot store.
    #[must_use]
    pub fn store(world: &World) -> &CacheStore {
        &world.store
    }

    /// Read-only access to the seeded generator.
    #[must_use]
    pub fn generator(world: &World) -> &Generator {
        &world.generator
    }

    /// Every token in every stored cache plus the player's holdings, sorted.
    ///
    /// Visible caches are committed on every change, so the store is
    /// authoritative. The result is invariant under collect and deposit.
    pub fn token_census(world: &World) -> Result<Vec<Token>, SnapshotError> {
        let mut census = world.holdings.clone();
        for (_, stored) in world.store.export() {
            census.extend(snapshot::decode(&stored)?.tokens);
        }
        census.sort();
        Ok(census)
    }
}
