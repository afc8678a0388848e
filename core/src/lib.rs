#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the geocache engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing what
//! changed. Cells, tokens and configuration live here so that every crate
//! agrees on identity and key derivation.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coordinate-space width of a single cell used when no configuration is supplied.
pub const DEFAULT_TILE_SIZE: f64 = 1e-4;
/// Neighborhood radius, in tiles, used when no configuration is supplied.
pub const DEFAULT_NEIGHBORHOOD_TILES: u32 = 8;
/// Probability that any given cell hosts a cache.
pub const DEFAULT_SPAWN_PROBABILITY: f64 = 0.1;
/// Scale applied to the token count draw: fresh caches hold `floor(draw * scale)` tokens.
pub const DEFAULT_TOKEN_DRAW_SCALE: u32 = 5;
/// Global seed string mixed into every pseudorandom draw.
pub const DEFAULT_WORLD_SEED: &str = "geocache";
/// Domain tag for the cache existence draw.
pub const SPAWN_TAG: &str = "spawn";
/// Domain tag for the initial token count draw.
pub const TOKEN_COUNT_TAG: &str = "initialValue";
/// Location the player starts at when no save exists.
pub const DEFAULT_ORIGIN: GeoPoint = GeoPoint::new(36.9995, -122.0533);

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Teleports the player to the provided location.
    MovePlayer {
        /// Location the player now occupies.
        to: GeoPoint,
    },
    /// Moves the player a single tile in the provided direction.
    StepPlayer {
        /// Direction of travel.
        direction: Direction,
    },
    /// Moves a token out of a visible cache into the player's holdings.
    CollectToken {
        /// Cell hosting the cache to collect from.
        cell: Cell,
        /// Token to collect. `None` takes the most recently added token.
        token: Option<Token>,
    },
    /// Moves a token from the player's holdings into a visible cache.
    DepositToken {
        /// Cell hosting the cache that receives the token.
        cell: Cell,
        /// Token to deposit. `None` deposits the most recently collected token.
        token: Option<Token>,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the player changed location.
    PlayerMoved {
        /// Location before the move.
        from: GeoPoint,
        /// Location after the move.
        to: GeoPoint,
    },
    /// Announces that a cache entered the player's neighborhood.
    CacheRevealed {
        /// Cell hosting the cache.
        cell: Cell,
        /// Number of tokens currently held by the cache.
        tokens: usize,
    },
    /// Announces that a cache left the player's neighborhood.
    CacheHidden {
        /// Cell hosting the cache.
        cell: Cell,
    },
    /// Reports that a stored snapshot could not be decoded and was regenerated.
    SnapshotDiscarded {
        /// Cell whose snapshot was discarded.
        cell: Cell,
        /// Human-readable decode failure.
        reason: String,
    },
    /// Confirms that a token moved from a cache into the player's holdings.
    TokenCollected {
        /// Cell hosting the cache the token left.
        cell: Cell,
        /// Token that moved.
        token: Token,
    },
    /// Confirms that a token moved from the player's holdings into a cache.
    TokenDeposited {
        /// Cell hosting the cache that received the token.
        cell: Cell,
        /// Token that moved.
        token: Token,
    },
    /// Reports that a collect or deposit request left state untouched.
    TransferRejected {
        /// Cell named by the request.
        cell: Cell,
        /// Specific reason the transfer did not happen.
        reason: TransferError,
    },
}

/// Reasons a token transfer may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum TransferError {
    /// No cache is visible at the requested cell.
    #[error("no visible cache at this cell")]
    NoCache,
    /// The source collection does not contain the requested token.
    #[error("token is not present")]
    TokenNotFound,
    /// The source collection holds no tokens at all.
    #[error("nothing left to move")]
    Empty,
}

/// Cardinal movement directions available to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward increasing latitude (row indices).
    North,
    /// Movement toward increasing longitude (column indices).
    East,
    /// Movement toward decreasing latitude.
    South,
    /// Movement toward decreasing longitude.
    West,
}

impl Direction {
    /// Unit `(row, col)` offset covered by a single step.
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::North => (1, 0),
            Self::East => (0, 1),
            Self::South => (-1, 0),
            Self::West => (0, -1),
        }
    }
}

/// Continuous geographic coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Creates a new point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude component.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude component.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Returns a new point shifted by the provided deltas.
    #[must_use]
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }
}

/// Axis-aligned rectangle in coordinate space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    south_west: GeoPoint,
    north_east: GeoPoint,
}

impl Region {
    /// Creates a region from its south-west and north-east corners.
    #[must_use]
    pub const fn new(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Corner with the smallest latitude and longitude.
    #[must_use]
    pub const fn south_west(&self) -> GeoPoint {
        self.south_west
    }

    /// Corner with the largest latitude and longitude.
    #[must_use]
    pub const fn north_east(&self) -> GeoPoint {
        self.north_east
    }

    /// Reports whether the point lies inside the half-open region.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat() >= self.south_west.lat()
            && point.lat() < self.north_east.lat()
            && point.lng() >= self.south_west.lng()
            && point.lng() < self.north_east.lng()
    }
}

/// One tile of the fixed-size partition of the coordinate plane.
///
/// The string form `"<row>,<col>"` is the key used by the world store, so
/// [`Cell::key`] and [`FromStr`] must stay inverse to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    row: i64,
    col: i64,
}

impl Cell {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Row index, derived from latitude.
    #[must_use]
    pub const fn row(&self) -> i64 {
        self.row
    }

    /// Column index, derived from longitude.
    #[must_use]
    pub const fn col(&self) -> i64 {
        self.col
    }

    /// Store key for the cell.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Returns the cell shifted by the provided row and column deltas.
    ///
    /// `None` when either index would leave the `i64` range.
    #[must_use]
    pub const fn offset(self, rows: i64, cols: i64) -> Option<Self> {
        match (self.row.checked_add(rows), self.col.checked_add(cols)) {
            (Some(row), Some(col)) => Some(Self::new(row, col)),
            _ => None,
        }
    }

    /// Largest per-axis distance between two cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: Cell) -> u64 {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Cell {
    type Err = ParseIdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (row, col) = value
            .split_once(',')
            .ok_or_else(|| ParseIdentityError::Cell(value.to_owned()))?;
        let row = row
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseIdentityError::Cell(value.to_owned()))?;
        let col = col
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseIdentityError::Cell(value.to_owned()))?;
        Ok(Self::new(row, col))
    }
}

/// Collectible unit identified by the cell it was generated in and a serial.
///
/// Tokens are plain values: equality is identity, and moving a token between
/// containers removes it from one and inserts an equal value into the other.
/// The string form is `"<row>,<col>#<serial>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token {
    origin: Cell,
    serial: u32,
}

impl Token {
    /// Creates a token minted in `origin` with the provided serial.
    #[must_use]
    pub const fn new(origin: Cell, serial: u32) -> Self {
        Self { origin, serial }
    }

    /// Cell in which the token was generated.
    #[must_use]
    pub const fn origin(&self) -> Cell {
        self.origin
    }

    /// Sequence number unique within the origin cell.
    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin, self.serial)
    }
}

impl FromStr for Token {
    type Err = ParseIdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (cell, serial) = value
            .trim()
            .rsplit_once('#')
            .ok_or_else(|| ParseIdentityError::Token(value.to_owned()))?;
        let origin = cell
            .parse::<Cell>()
            .map_err(|_| ParseIdentityError::Token(value.to_owned()))?;
        let serial = serial
            .parse::<u32>()
            .map_err(|_| ParseIdentityError::Token(value.to_owned()))?;
        Ok(Self::new(origin, serial))
    }
}

/// Failure to parse a cell key or token identity string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseIdentityError {
    /// The string is not of the form `"<row>,<col>"`.
    #[error("'{0}' is not a cell key")]
    Cell(String),
    /// The string is not of the form `"<row>,<col>#<serial>"`.
    #[error("'{0}' is not a token identity")]
    Token(String),
}

/// Size of the neighborhood enumerated around the player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborhoodRadius {
    /// Radius measured directly in tiles.
    Tiles(u32),
    /// Radius measured in coordinate units, rounded up to whole tiles.
    Distance(f64),
}

/// Tunable parameters of the world.
///
/// Every field influences either geometry or seeded generation, so changing
/// any of them changes which caches exist and what fresh caches contain.
/// Snapshots already in the store stay valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Coordinate-space width of one cell.
    pub tile_size: f64,
    /// Neighborhood enumerated around the player.
    pub neighborhood: NeighborhoodRadius,
    /// Probability that a cell hosts a cache.
    pub spawn_probability: f64,
    /// Scale applied to the token count draw.
    pub token_draw_scale: u32,
    /// Global seed string mixed into every draw.
    pub seed: String,
    /// Domain tag for the existence draw.
    pub spawn_tag: String,
    /// Domain tag for the token count draw.
    pub token_count_tag: String,
    /// Starting location of a new player.
    pub origin: GeoPoint,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            neighborhood: NeighborhoodRadius::Tiles(DEFAULT_NEIGHBORHOOD_TILES),
            spawn_probability: DEFAULT_SPAWN_PROBABILITY,
            token_draw_scale: DEFAULT_TOKEN_DRAW_SCALE,
            seed: DEFAULT_WORLD_SEED.to_owned(),
            spawn_tag: SPAWN_TAG.to_owned(),
            token_count_tag: TOKEN_COUNT_TAG.to_owned(),
            origin: DEFAULT_ORIGIN,
        }
    }
}

impl WorldConfig {
    /// Checks every parameter, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tile_size(self.tile_size)?;
        if let NeighborhoodRadius::Distance(distance) = self.neighborhood {
            if !distance.is_finite() || distance < 0.0 {
                return Err(ConfigError::InvalidRadius(distance));
            }
        }
        if !(0.0..=1.0).contains(&self.spawn_probability) {
            return Err(ConfigError::InvalidSpawnProbability(self.spawn_probability));
        }
        if self.seed.is_empty() {
            return Err(ConfigError::EmptySeed("seed"));
        }
        if self.spawn_tag.is_empty() {
            return Err(ConfigError::EmptySeed("spawn_tag"));
        }
        if self.token_count_tag.is_empty() {
            return Err(ConfigError::EmptySeed("token_count_tag"));
        }
        if self.spawn_tag == self.token_count_tag {
            return Err(ConfigError::SharedTag(self.spawn_tag.clone()));
        }
        Ok(())
    }

    /// Resolves the configured neighborhood into a whole number of tiles.
    ///
    /// Distance radii are divided by the tile size and rounded up, so a
    /// distance covering any part of a tile includes that tile.
    #[must_use]
    pub fn radius_in_tiles(&self) -> u32 {
        match self.neighborhood {
            NeighborhoodRadius::Tiles(tiles) => tiles,
            NeighborhoodRadius::Distance(distance) => {
                if self.tile_size <= 0.0 || distance <= 0.0 {
                    return 0;
                }
                let tiles = (distance / self.tile_size).ceil();
                tiles.min(f64::from(u32::MAX)) as u32
            }
        }
    }
}

/// Validates a tile size on its own, for callers that only need geometry.
pub fn validate_tile_size(tile_size: f64) -> Result<(), ConfigError> {
    if tile_size.is_finite() && tile_size > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTileSize(tile_size))
    }
}

/// Reasons a configuration is refused at construction time.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Tile size must be finite and strictly positive.
    #[error("tile size {0} must be finite and positive")]
    InvalidTileSize(f64),
    /// Distance radius must be finite and non-negative.
    #[error("neighborhood radius {0} must be finite and non-negative")]
    InvalidRadius(f64),
    /// Spawn probability must lie within `[0, 1]`.
    #[error("spawn probability {0} must lie within [0, 1]")]
    InvalidSpawnProbability(f64),
    /// Seed strings and domain tags must not be empty.
    #[error("{0} must not be empty")]
    EmptySeed(&'static str),
    /// Existence and token count draws must use different tags.
    #[error("spawn and token count draws both use tag '{0}'")]
    SharedTag(String),
}
