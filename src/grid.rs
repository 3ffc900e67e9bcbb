// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The concurrent spatial grid: a uniform array of cells, each independently
//! locked, indexing every live [`GameObject`] in the arena.
//!
//! A fixed-size array of cells with swap-remove-by-index membership,
//! scaled down from circle/radius queries to the rectangular window a view
//! tick needs, and built with per-cell `parking_lot::RwLock`s (rather than
//! a single-threaded `&mut self` API) so readers (other workers' view
//! ticks) and writers (the owning worker) only contend on cells they both
//! touch.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::game_object::GameObject;

/// Handle to a live object, shared between its owning worker's local
/// registries and whichever grid cell currently indexes it.
pub type ObjectRef = Arc<RwLock<GameObject>>;

struct Cell {
    members: RwLock<Vec<ObjectRef>>,
}

impl Cell {
    fn new() -> Self {
        Self {
            members: RwLock::new(Vec::new()),
        }
    }
}

/// A fixed-size world partitioned into uniform square cells, each with its
/// own reader/writer lock. There is no global grid lock: a call never holds
/// more than one cell lock at a time.
pub struct Grid {
    width: f64,
    height: f64,
    cell_size: f64,
    cols: i32,
    rows: i32,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let cols = (width / cell_size).ceil() as i32;
        let rows = (height / cell_size).ceil() as i32;
        let mut cells = Vec::with_capacity((rows * cols) as usize);
        for _ in 0..(rows * cols) {
            cells.push(Cell::new());
        }
        Self {
            width,
            height,
            cell_size,
            cols,
            rows,
            cells,
        }
    }

    fn in_bounds(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && x < self.width && y >= 0.0 && y < self.height
    }

    /// `(row, col)` for a position already known to be in bounds.
    fn cell_of(&self, x: f64, y: f64) -> (i32, i32) {
        let col = (x / self.cell_size) as i32;
        let row = (y / self.cell_size) as i32;
        (row.clamp(0, self.rows - 1), col.clamp(0, self.cols - 1))
    }

    fn index(&self, row: i32, col: i32) -> usize {
        (row * self.cols + col) as usize
    }

    /// Inserts an object; out-of-bounds attempts are dropped silently.
    pub fn insert(&self, obj: ObjectRef) {
        let (row, col) = {
            let o = obj.read();
            if !self.in_bounds(o.x, o.y) {
                return;
            }
            self.cell_of(o.x, o.y)
        };
        let cell = &self.cells[self.index(row, col)];
        let mut members = cell.members.write();
        {
            let mut o = obj.write();
            o.row = row;
            o.col = col;
            o.slot = Some(members.len());
        }
        members.push(obj);
    }

    /// Removes an object from the cell recorded on it (not recomputed).
    /// Idempotent but silent if the object is not present.
    pub fn remove(&self, obj: &ObjectRef) {
        let (row, col, slot) = {
            let o = obj.read();
            (o.row, o.col, o.slot)
        };
        let Some(slot) = slot else { return };
        if row < 0 || row >= self.rows || col < 0 || col >= self.cols {
            return;
        }
        let cell = &self.cells[self.index(row, col)];
        let mut members = cell.members.write();
        if slot >= members.len() {
            return;
        }
        members.swap_remove(slot);
        if let Some(moved) = members.get(slot) {
            moved.write().slot = Some(slot);
        }
        drop(members);
        obj.write().slot = None;
    }

    /// Projects `obj` to `now`; if it crossed into a new cell, commits the
    /// transition (and re-anchors position/`time_update`/`life_length`).
    /// Movement that stays within one cell never touches the grid at all.
    pub fn update(&self, obj: &ObjectRef, now: i64) {
        let (old_row, old_col, cur_x, cur_y, in_bounds) = {
            let o = obj.read();
            let cur_x = o.cur_x(now);
            let cur_y = o.cur_y(now);
            (o.row, o.col, cur_x, cur_y, self.in_bounds(cur_x, cur_y))
        };
        if !in_bounds {
            return;
        }
        let (new_row, new_col) = self.cell_of(cur_x, cur_y);
        if (new_row, new_col) == (old_row, old_col) {
            return;
        }

        // Leave the old cell first; never hold two cell locks at once.
        let slot = obj.read().slot;
        if let Some(slot) = slot {
            let old_cell = &self.cells[self.index(old_row, old_col)];
            let mut old_members = old_cell.members.write();
            if slot < old_members.len() {
                old_members.swap_remove(slot);
                if let Some(moved) = old_members.get(slot) {
                    moved.write().slot = Some(slot);
                }
            }
        }

        {
            let mut o = obj.write();
            let elapsed = (now - o.time_update).max(0);
            o.x = cur_x;
            o.y = cur_y;
            o.life_length -= elapsed;
            o.time_update = now;
            o.row = new_row;
            o.col = new_col;
        }

        let new_cell = &self.cells[self.index(new_row, new_col)];
        let mut new_members = new_cell.members.write();
        obj.write().slot = Some(new_members.len());
        new_members.push(Arc::clone(obj));
    }

    /// All objects whose home cell falls in the inclusive rectangle, clipped
    /// to the grid. Empty if `y_lo > y_hi` or `x_lo > x_hi`. The snapshot is
    /// point-in-time per cell, not globally consistent.
    pub fn search(&self, y_lo: f64, y_hi: f64, x_lo: f64, x_hi: f64) -> Vec<ObjectRef> {
        if y_lo > y_hi || x_lo > x_hi {
            return Vec::new();
        }

        let row_lo = ((y_lo / self.cell_size).floor() as i32).clamp(0, self.rows - 1);
        let row_hi = ((y_hi / self.cell_size).floor() as i32).clamp(0, self.rows - 1);
        let col_lo = ((x_lo / self.cell_size).floor() as i32).clamp(0, self.cols - 1);
        let col_hi = ((x_hi / self.cell_size).floor() as i32).clamp(0, self.cols - 1);

        let mut out = Vec::new();
        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let cell = &self.cells[self.index(row, col)];
                out.extend(cell.members.read().iter().cloned());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_object::GameObject;

    fn obj_at(id: &str, x: f64, y: f64) -> ObjectRef {
        let mut o = GameObject::new_player(id.to_string());
        o.x = x;
        o.y = y;
        Arc::new(RwLock::new(o))
    }

    #[test]
    fn insert_then_remove_is_idempotent() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let a = obj_at("a", 150.0, 250.0);
        grid.insert(Arc::clone(&a));
        assert_eq!(a.read().row, 2);
        assert_eq!(a.read().col, 1);
        grid.remove(&a);
        grid.remove(&a); // idempotent, no panic
        assert!(grid.search(0.0, 1600.0, 0.0, 1600.0).is_empty());
    }

    #[test]
    fn out_of_bounds_insert_is_dropped() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let a = obj_at("a", -5.0, 0.0);
        grid.insert(Arc::clone(&a));
        assert!(grid.search(0.0, 1600.0, 0.0, 1600.0).is_empty());
    }

    #[test]
    fn search_finds_inserted_objects_in_window() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let a = obj_at("a", 200.0, 200.0);
        let b = obj_at("b", 250.0, 200.0);
        let c = obj_at("c", 1500.0, 1500.0);
        grid.insert(Arc::clone(&a));
        grid.insert(Arc::clone(&b));
        grid.insert(Arc::clone(&c));

        let found = grid.search(100.0, 300.0, 100.0, 300.0);
        let ids: Vec<String> = found.iter().map(|o| o.read().id.clone()).collect();
        assert!(ids.contains(&"a".to_string()));
        assert!(ids.contains(&"b".to_string()));
        assert!(!ids.contains(&"c".to_string()));
    }

    #[test]
    fn inverted_range_is_empty() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        assert!(grid.search(100.0, 0.0, 0.0, 100.0).is_empty());
        assert!(grid.search(0.0, 100.0, 100.0, 0.0).is_empty());
    }

    #[test]
    fn update_moves_between_cells_and_reanchors() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let a = obj_at("a", 50.0, 50.0);
        {
            let mut o = a.write();
            o.vx = 1000.0; // far enough to cross a cell boundary in 100ms
            o.time_update = 0;
        }
        grid.insert(Arc::clone(&a));
        let (old_row, old_col) = (a.read().row, a.read().col);

        grid.update(&a, 100);

        let (new_row, new_col) = (a.read().row, a.read().col);
        assert_ne!((old_row, old_col), (new_row, new_col));
        assert_eq!(a.read().time_update, 100);
        assert!((a.read().x - 150.0).abs() < 1e-9);

        let found = grid.search(0.0, 1600.0, 0.0, 1600.0);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn update_within_same_cell_is_a_grid_noop() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let a = obj_at("a", 50.0, 50.0);
        {
            let mut o = a.write();
            o.vx = 10.0;
            o.time_update = 0;
        }
        grid.insert(Arc::clone(&a));
        let time_update_before = a.read().time_update;
        let x_before = a.read().x;

        grid.update(&a, 50);

        // No cell transition occurred, so the anchor is untouched; the
        // reader is expected to project with cur_x/cur_y instead.
        assert_eq!(a.read().time_update, time_update_before);
        assert_eq!(a.read().x, x_before);
    }

    #[test]
    fn every_live_object_is_in_exactly_its_computed_cell() {
        let grid = Grid::new(1600.0, 1600.0, 100.0);
        let objects: Vec<ObjectRef> = (0..50)
            .map(|i| obj_at(&format!("o{i}"), (i * 31 % 1600) as f64, (i * 53 % 1600) as f64))
            .collect();
        for o in &objects {
            grid.insert(Arc::clone(o));
        }
        for o in &objects {
            let (row, col, expected_row, expected_col) = {
                let locked = o.read();
                (
                    locked.row,
                    locked.col,
                    (locked.y / 100.0) as i32,
                    (locked.x / 100.0) as i32,
                )
            };
            assert_eq!((row, col), (expected_row, expected_col));
        }
    }
}
