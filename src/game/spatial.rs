//! Spatial hash grid for drone neighbor queries
//!
//! Divides the world into square cells and stores a snapshot of every drone
//! in the cell containing it. A neighbor query only visits the query cell and
//! its eight neighbors, so steering costs O(local density) per drone instead
//! of O(n). The grid is rebuilt from scratch every tick and never patched.

use crate::game::constants::grid::CELL_SIZE;
use crate::game::state::{Drone, DroneId};
use crate::util::vec2::Vec2;
use hashbrown::HashMap;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 1024;

/// Initial capacity for drone vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Drone data captured in the grid at rebuild time
///
/// Neighbors are read from this snapshot, never from the live drone list,
/// so every drone in a tick sees the same neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEntry {
    pub id: DroneId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

impl GridEntry {
    pub fn from_drone(drone: &Drone) -> Self {
        Self {
            id: drone.id,
            position: drone.position,
            velocity: drone.velocity,
            radius: drone.radius,
        }
    }
}

/// Spatial hash grid over drones
#[derive(Debug, Clone)]
pub struct DroneGrid {
    /// Cell size in world units (must cover the largest interaction radius)
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Map from cell key to drones in that cell
    cells: HashMap<CellKey, Vec<GridEntry>>,
    /// Pre-allocated neighbor offsets for 9-cell query
    neighbor_offsets: [(i32, i32); 9],
}

impl DroneGrid {
    /// Create a new grid with the given cell size
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            neighbor_offsets: [
                (-1, -1), (0, -1), (1, -1),
                (-1,  0), (0,  0), (1,  0),
                (-1,  1), (0,  1), (1,  1),
            ],
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Remove every entry. Cell vectors keep their capacity for the next rebuild.
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    /// Convert world position to cell key
    #[inline]
    pub fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Insert a drone snapshot into the bucket for its position
    #[inline]
    pub fn insert(&mut self, entry: GridEntry) {
        let cell_key = self.position_to_cell(entry.position);
        self.cells
            .entry(cell_key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(entry);
    }

    /// Discard the previous contents and insert every drone again
    pub fn rebuild<'a>(&mut self, drones: impl Iterator<Item = &'a Drone>) {
        self.clear();
        for drone in drones {
            self.insert(GridEntry::from_drone(drone));
        }
    }

    /// All entries in the 3x3 block of cells around `position`.
    ///
    /// This is a superset of every drone within `cell_size` of the position;
    /// callers filter by exact distance.
    pub fn neighbors(&self, position: Vec2) -> impl Iterator<Item = &GridEntry> {
        let (cx, cy) = self.position_to_cell(position);

        self.neighbor_offsets.iter().flat_map(move |&(dx, dy)| {
            let cell_key = (cx + dx, cy + dy);
            self.cells.get(&cell_key).into_iter().flat_map(|cell| cell.iter())
        })
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> DroneGridStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let total_entries: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        DroneGridStats {
            non_empty_cells,
            total_entries,
            max_per_cell,
        }
    }
}

impl Default for DroneGrid {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

/// Statistics about the drone grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroneGridStats {
    pub non_empty_cells: usize,
    pub total_entries: usize,
    pub max_per_cell: usize,
}
