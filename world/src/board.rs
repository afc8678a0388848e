//! Grid indexer that quantizes coordinates into canonical cells.

use std::collections::BTreeSet;

use geocache_core::{validate_tile_size, Cell, ConfigError, GeoPoint, Region};

/// Owned registry of every cell observed during a session.
///
/// All cell lookups in the world funnel through [`Board::canonical`], so the
/// known set and the cache store agree on identity: both key cells by
/// [`Cell::key`]. The set only grows.
#[derive(Clone, Debug)]
pub struct Board {
    tile_size: f64,
    known: BTreeSet<Cell>,
}

impl Board {
    /// Creates an empty board, refusing tile sizes that would produce degenerate geometry.
    pub fn new(tile_size: f64) -> Result<Self, ConfigError> {
        validate_tile_size(tile_size)?;
        Ok(Self {
            tile_size,
            known: BTreeSet::new(),
        })
    }

    /// Coordinate-space width of one cell.
    #[must_use]
    pub const fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Returns the canonical cell for the coordinate pair, registering it if unseen.
    pub fn canonical(&mut self, cell: Cell) -> Cell {
        if let Some(known) = self.known.get(&cell) {
            return *known;
        }
        let _ = self.known.insert(cell);
        cell
    }

    /// Returns the canonical cell containing the point.
    ///
    /// Quantization is total: `f64` to `i64` casts saturate, so extreme or
    /// non-finite coordinates still map onto some cell.
    pub fn cell_containing(&mut self, point: GeoPoint) -> Cell {
        let row = (point.lat() / self.tile_size).floor() as i64;
        let col = (point.lng() / self.tile_size).floor() as i64;
        self.canonical(Cell::new(row, col))
    }

    /// Coordinate-space rectangle covered by the cell.
    #[must_use]
    pub fn bounds_of(&self, cell: Cell) -> Region {
        let south = cell.row() as f64 * self.tile_size;
        let west = cell.col() as f64 * self.tile_size;
        Region::new(
            GeoPoint::new(south, west),
            GeoPoint::new(south + self.tile_size, west + self.tile_size),
        )
    }

    /// Enumerates the square neighborhood around the cell containing `point`.
    ///
    /// Rows and columns span `origin - radius .. origin + radius` (half-open),
    /// yielding exactly `(2 * radius)^2` distinct cells in row-major order.
    /// Near the edge of the `i64` index range the cells that would fall
    /// outside it are skipped, so the result may be smaller but never
    /// repeats a cell.
    pub fn cells_within_radius(&mut self, point: GeoPoint, radius_in_tiles: u32) -> Vec<Cell> {
        let origin = self.cell_containing(point);
        let radius = i64::from(radius_in_tiles);
        let side = usize::try_from(radius_in_tiles).unwrap_or(0).saturating_mul(2);
        let mut cells = Vec::with_capacity(side.saturating_mul(side));
        for row in -radius..radius {
            for col in -radius..radius {
                if let Some(cell) = origin.offset(row, col) {
                    cells.push(self.canonical(cell));
                }
            }
        }
        cells
    }

    /// Reports whether the cell has been observed during this session.
    #[must_use]
    pub fn is_known(&self, cell: Cell) -> bool {
        self.known.contains(&cell)
    }

    /// Iterator over every known cell in ascending order.
    pub fn known_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.known.iter().copied()
    }
}
