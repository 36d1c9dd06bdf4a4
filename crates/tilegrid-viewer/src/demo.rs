//! Tiny scripted game state feeding the viewer.
//!
//! A walker crosses the middle row of a walled room, picking up screws. When
//! the last screw is gone the level counter advances and the room resets.

use std::collections::HashMap;

use tilegrid_engine::tiles::{Board, GridSize, Status};

const WALL: u32 = 18;
const SCREW: u32 = 4;
const KEY: u32 = 5;
const WALKER: u32 = 60;

const SCREW_COLUMNS: [u32; 4] = [5, 11, 19, 26];
const KEY_COLUMN: u32 = 15;

pub struct Demo {
    grid: GridSize,
    walker: (u32, u32),
    items: HashMap<(u32, u32), u32>,
    status: Status,
}

impl Demo {
    pub fn new(grid: GridSize) -> Self {
        let mut demo = Self {
            grid,
            walker: (1, grid.height / 2),
            items: HashMap::new(),
            status: Status::default(),
        };
        demo.reset_level();
        demo
    }

    fn reset_level(&mut self) {
        let row = self.grid.height / 2;
        self.walker = (1, row);
        self.items = SCREW_COLUMNS
            .iter()
            .filter(|&&x| x + 1 < self.grid.width)
            .map(|&x| ((x, row), SCREW))
            .collect();
        if KEY_COLUMN + 1 < self.grid.width {
            self.items.insert((KEY_COLUMN, row), KEY);
        }
    }

    #[inline]
    pub fn status(&self) -> &Status {
        &self.status
    }

    #[inline]
    pub fn walker(&self) -> (u32, u32) {
        self.walker
    }

    /// Advances one step: move right inside the walls, collect what is there.
    pub fn step(&mut self) {
        let (x, y) = self.walker;
        let next = if x + 2 >= self.grid.width { 1 } else { x + 1 };
        self.walker = (next, y);

        match self.items.remove(&self.walker) {
            Some(SCREW) => {
                self.status.screws += 1;
                if !self.items.values().any(|&code| code == SCREW) {
                    self.status.level += 1;
                    self.status.ammo += 9;
                    log::info!("level cleared; now {}", self.status.level);
                    self.reset_level();
                }
            }
            Some(KEY) => self.status.keys += 1,
            _ => {}
        }
    }

    /// Board snapshot: walls on the rim, then items, then the walker on top.
    pub fn board(&self) -> Board {
        let (w, h) = (self.grid.width, self.grid.height);
        let walls = (0..w)
            .flat_map(|x| [(x, 0), (x, h - 1)])
            .chain((1..h - 1).flat_map(|y| [(0, y), (w - 1, y)]))
            .map(|p| (p, WALL));

        let items = self.items.iter().map(|(&p, &code)| (p, code));
        let walker = std::iter::once((self.walker, WALKER));

        Board::from_tiles(self.grid, walls.chain(items).chain(walker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Demo {
        Demo::new(GridSize::new(31, 16))
    }

    #[test]
    fn board_has_walls_items_and_walker() {
        let d = demo();
        let board = d.board();
        let rim = 2 * 31 + 2 * 14;
        assert_eq!(board.visible_count(), rim + SCREW_COLUMNS.len() + 1 + 1);
        assert_eq!(board.get(0, 0), Some(WALL));
        assert_eq!(board.get(1, 8), Some(WALKER));
        assert_eq!(board.get(5, 8), Some(SCREW));
    }

    #[test]
    fn walking_onto_a_screw_collects_it() {
        let mut d = demo();
        for _ in 0..4 {
            d.step();
        }
        assert_eq!(d.walker(), (5, 8));
        assert_eq!(d.status().screws, 1);
        assert_eq!(d.board().get(5, 8), Some(WALKER));
    }

    #[test]
    fn walker_wraps_inside_walls() {
        let mut d = Demo::new(GridSize::new(4, 3));
        d.step();
        assert_eq!(d.walker(), (2, 1));
        d.step();
        assert_eq!(d.walker(), (1, 1));
    }

    #[test]
    fn clearing_all_screws_advances_level() {
        let mut d = demo();
        for _ in 0..25 {
            d.step();
        }
        assert_eq!(d.status().screws, 4);
        assert_eq!(d.status().keys, 1);
        assert_eq!(d.status().level, 1);
        assert_eq!(d.walker(), (1, 8));
        assert_eq!(d.status().to_string(), "screws: 4, keys: 1, ammo: 9, level: 1");
    }
}
