// Spatial hash grid for near-neighbor queries over points.
//
// Instead of checking every pair, points are bucketed into square cells whose
// side is the largest distance of interest; any pair closer than that lies in
// the same or an adjacent cell.

use rustc_hash::FxHashMap;

use super::Position;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: FxHashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Cell size should be the largest query distance.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        Self { cell_size, cells: FxHashMap::default() }
    }

    fn cell_of(&self, p: Position) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    pub fn insert(&mut self, index: usize, p: Position) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Indices in the 3x3 block of cells around `p`, ascending.
    /// May include false positives; caller does the exact distance check.
    pub fn neighbors(&self, p: Position) -> Vec<usize> {
        let (cx, cy) = self.cell_of(p);
        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out.sort_unstable();
        out
    }
}
