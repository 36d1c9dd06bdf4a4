/// Tile code meaning "draw nothing for this cell".
///
/// Every code `>= EMPTY_TILE` is treated as empty; there is no separate
/// "out of range" state.
pub const EMPTY_TILE: u32 = 255;

#[inline]
pub const fn is_visible(code: u32) -> bool {
    code < EMPTY_TILE
}

/// Board dimensions in cells.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of cells (`W * H`).
    #[inline]
    pub const fn cell_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Maps a board index to its world cell `(x, y)`.
    ///
    /// Row-major, vertically flipped: index 0 lands on row `H - 1`.
    #[inline]
    pub const fn cell_of(self, index: usize) -> (u32, u32) {
        let w = self.width as usize;
        let x = (index % w) as u32;
        let y = self.height - 1 - (index / w) as u32;
        (x, y)
    }

    /// Inverse of [`cell_of`](Self::cell_of). `None` when `(x, y)` is outside the grid.
    #[inline]
    pub const fn index_of(self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = (self.height - 1 - y) as usize;
        Some(row * self.width as usize + x as usize)
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(31, 16)
    }
}

/// Partition of the texture atlas into `cols x rows` equal cells.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AtlasGrid {
    pub cols: u32,
    pub rows: u32,
}

impl AtlasGrid {
    #[inline]
    pub const fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Atlas cell `(col, row)` for a tile code, with row 0 at the bottom.
    ///
    /// Codes past the last row wrap around; that samples an unintended cell
    /// but is otherwise harmless.
    #[inline]
    pub const fn cell_of(self, code: u32) -> (u32, u32) {
        let col = code % self.cols;
        let row = (self.rows - 1).wrapping_sub(code / self.cols) % self.rows;
        (col, row)
    }

    /// `(min, max)` UV corners of the atlas cell for `code`.
    ///
    /// Atlas-cell space has +V up, matching the board's flip convention.
    /// Corners are computed as `i / n` directly so neighbouring cells share
    /// bit-identical edges.
    #[inline]
    pub fn uv_bounds(self, code: u32) -> ([f32; 2], [f32; 2]) {
        let (col, row) = self.cell_of(code);
        let (cols, rows) = (self.cols as f32, self.rows as f32);
        (
            [col as f32 / cols, row as f32 / rows],
            [(col + 1) as f32 / cols, (row + 1) as f32 / rows],
        )
    }
}

impl Default for AtlasGrid {
    fn default() -> Self {
        Self::new(12, 8)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board has {actual} cells, expected {expected} for a {width}x{height} grid")]
    LengthMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
}

/// Fixed-size board of tile codes, one per grid cell, in board-index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    grid: GridSize,
    cells: Vec<u32>,
}

impl Board {
    /// A board with every cell set to [`EMPTY_TILE`].
    pub fn empty(grid: GridSize) -> Self {
        Self {
            grid,
            cells: vec![EMPTY_TILE; grid.cell_count()],
        }
    }

    /// Wraps raw cells. Fails if `cells.len() != W * H`.
    pub fn from_cells(grid: GridSize, cells: Vec<u32>) -> Result<Self, BoardError> {
        if cells.len() != grid.cell_count() {
            return Err(BoardError::LengthMismatch {
                expected: grid.cell_count(),
                actual: cells.len(),
                width: grid.width,
                height: grid.height,
            });
        }
        Ok(Self { grid, cells })
    }

    /// Assembles a board from sparse world-space placements.
    ///
    /// Cells nobody claims stay empty. Out-of-grid positions are dropped;
    /// for duplicate positions the last entry wins.
    pub fn from_tiles<I>(grid: GridSize, tiles: I) -> Self
    where
        I: IntoIterator<Item = ((u32, u32), u32)>,
    {
        let mut board = Self::empty(grid);
        for ((x, y), code) in tiles {
            if !board.set(x, y, code) {
                log::trace!("Board::from_tiles: ({x}, {y}) outside {}x{}", grid.width, grid.height);
            }
        }
        board
    }

    #[inline]
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    #[inline]
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Tile code at world cell `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        self.grid.index_of(x, y).map(|i| self.cells[i])
    }

    /// Writes the tile code at world cell `(x, y)`. Returns `false` if outside the grid.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, code: u32) -> bool {
        match self.grid.index_of(x, y) {
            Some(i) => {
                self.cells[i] = code;
                true
            }
            None => false,
        }
    }

    /// Resets every cell to [`EMPTY_TILE`].
    pub fn clear(&mut self) {
        self.cells.fill(EMPTY_TILE);
    }

    /// Number of cells that produce geometry.
    pub fn visible_count(&self) -> usize {
        self.cells.iter().filter(|&&c| is_visible(c)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: GridSize = GridSize::new(31, 16);
    const ATLAS: AtlasGrid = AtlasGrid::new(12, 8);

    // ── board index mapping ───────────────────────────────────────────────

    #[test]
    fn first_index_maps_to_last_row() {
        assert_eq!(GRID.cell_of(0), (0, 15));
    }

    #[test]
    fn last_index_maps_to_row_zero() {
        assert_eq!(GRID.cell_of(GRID.cell_count() - 1), (30, 0));
    }

    #[test]
    fn index_of_inverts_cell_of() {
        for i in 0..GRID.cell_count() {
            let (x, y) = GRID.cell_of(i);
            assert_eq!(GRID.index_of(x, y), Some(i));
        }
    }

    #[test]
    fn index_of_outside_is_none() {
        assert_eq!(GRID.index_of(31, 0), None);
        assert_eq!(GRID.index_of(0, 16), None);
    }

    // ── atlas mapping ─────────────────────────────────────────────────────

    #[test]
    fn tile_zero_is_top_left_cell() {
        assert_eq!(ATLAS.cell_of(0), (0, 7));
        assert_eq!(ATLAS.uv_bounds(0), ([0.0, 7.0 / 8.0], [1.0 / 12.0, 1.0]));
    }

    #[test]
    fn tile_thirteen_is_second_row_second_col() {
        assert_eq!(ATLAS.cell_of(13), (1, 6));
    }

    #[test]
    fn distinct_codes_get_disjoint_uv_rects() {
        let n = ATLAS.cols * ATLAS.rows;
        for a in 0..n {
            for b in (a + 1)..n {
                assert_ne!(ATLAS.cell_of(a), ATLAS.cell_of(b));
                let (amin, amax) = ATLAS.uv_bounds(a);
                let (bmin, bmax) = ATLAS.uv_bounds(b);
                let disjoint = amax[0] <= bmin[0]
                    || bmax[0] <= amin[0]
                    || amax[1] <= bmin[1]
                    || bmax[1] <= amin[1];
                assert!(disjoint, "codes {a} and {b} overlap");
            }
        }
    }

    #[test]
    fn out_of_range_code_wraps_without_panicking() {
        let (col, row) = ATLAS.cell_of(200);
        assert!(col < ATLAS.cols);
        assert!(row < ATLAS.rows);
    }

    // ── board ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_board_has_no_visible_cells() {
        let board = Board::empty(GRID);
        assert_eq!(board.len(), 31 * 16);
        assert_eq!(board.visible_count(), 0);
    }

    #[test]
    fn from_cells_rejects_wrong_length() {
        let err = Board::from_cells(GRID, vec![0; 10]).unwrap_err();
        assert_eq!(
            err,
            BoardError::LengthMismatch { expected: 496, actual: 10, width: 31, height: 16 }
        );
    }

    #[test]
    fn sentinel_and_above_are_not_visible() {
        let mut cells = vec![EMPTY_TILE; GRID.cell_count()];
        cells[0] = 0;
        cells[1] = 254;
        cells[2] = 256;
        cells[3] = u32::MAX;
        let board = Board::from_cells(GRID, cells).unwrap();
        assert_eq!(board.visible_count(), 2);
    }

    #[test]
    fn from_tiles_places_by_world_position() {
        let board = Board::from_tiles(GRID, [((0, 15), 4), ((30, 0), 9)]);
        assert_eq!(board.cells()[0], 4);
        assert_eq!(board.cells()[GRID.cell_count() - 1], 9);
        assert_eq!(board.visible_count(), 2);
    }

    #[test]
    fn from_tiles_drops_outside_and_last_wins() {
        let board = Board::from_tiles(GRID, [((40, 2), 1), ((3, 3), 5), ((3, 3), 6)]);
        assert_eq!(board.get(3, 3), Some(6));
        assert_eq!(board.visible_count(), 1);
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut board = Board::from_tiles(GRID, [((1, 1), 1)]);
        board.clear();
        assert_eq!(board, Board::empty(GRID));
    }
}
