// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A game object, such as a player or a snowball.
//!
//! A player's projection is just the identity case of a snowball's (zero
//! velocity), so there is no subclassing or virtual dispatch here: one
//! struct, one kind tag, one projection formula shared by both.

use crate::protocol::ObjectRecord;

/// Death grace window: how long a dead object stays indexed so every
/// subscriber gets at least one view-tick to observe the death.
pub const DEATH_GRACE_MS: i64 = 1000;

/// How fast a player moves, in world units per second.
pub const PLAYER_SPEED: f64 = 200.0;

/// Which of the two kinds of entity this object represents.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ObjectKind {
    Player,
    Snowball,
}

/// Index of this object within its current grid cell, maintained by
/// [`crate::grid::Grid`] for O(1) removal. `None` if not currently indexed.
pub type CellSlot = Option<usize>;

/// A live player or snowball. Position, velocity, and wall-clock anchor are
/// always updated together, so projection never reads a torn state.
#[derive(Clone, Debug)]
pub struct GameObject {
    pub id: String,
    pub kind: ObjectKind,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub size: f64,
    /// Current grid cell, `(row, col)`. Kept in sync with the grid by
    /// [`crate::grid::Grid`]; meaningless (and unused) while not indexed.
    pub row: i32,
    pub col: i32,
    pub health: i32,
    pub damage: i32,
    /// Wall-clock anchor (ms) that `x, y` were valid at.
    pub time_update: i64,
    /// Remaining lifetime (ms) from `time_update`.
    pub life_length: i64,
    pub is_dead: bool,
    pub is_penetrable: bool,
    pub charging: bool,
    /// Slot within the owning cell's member vector, for O(1) swap-removal.
    pub(crate) slot: CellSlot,
}

impl GameObject {
    /// Allocates a freshly-joined player at the origin. Populated for real by
    /// the `join` handler.
    pub fn new_player(id: String) -> Self {
        Self {
            id,
            kind: ObjectKind::Player,
            username: "unknown".to_string(),
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            size: 20.0,
            row: 0,
            col: 0,
            health: 100,
            damage: 0,
            time_update: 0,
            // Players don't expire via TTL; effectively-infinite life length.
            life_length: i64::MAX / 2,
            is_dead: false,
            is_penetrable: false,
            charging: false,
            slot: None,
        }
    }

    /// Allocates a new, as-yet-unpositioned snowball with the canonical
    /// `snowball_<owner>_<seq>` id shape.
    pub fn new_snowball(id: String) -> Self {
        Self {
            id,
            kind: ObjectKind::Snowball,
            username: String::new(),
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            size: 5.0,
            row: 0,
            col: 0,
            health: 0,
            damage: 0,
            time_update: 0,
            life_length: 0,
            is_dead: false,
            is_penetrable: true,
            charging: false,
            slot: None,
        }
    }

    /// Position projected to `now`, given the last anchor.
    /// `cur_x(time_update) == x` exactly; for a player at rest, `cur_x(t) == x`
    /// for any `t`.
    pub fn cur_x(&self, now: i64) -> f64 {
        self.x + self.vx * (now - self.time_update) as f64 / 1000.0
    }

    pub fn cur_y(&self, now: i64) -> f64 {
        self.y + self.vy * (now - self.time_update) as f64 / 1000.0
    }

    /// True once the object has outlived `life_length` from `time_update`.
    pub fn expired(&self, now: i64) -> bool {
        now - self.time_update > self.life_length
    }

    /// Static overlap test against `other`'s stored (not projected) position.
    /// Used for impenetrable barriers. Marks `self` dead on contact.
    pub fn touch(&mut self, other: &GameObject) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let r = self.size + other.size;
        let hit = dx * dx + dy * dy <= r * r;
        if hit {
            self.is_dead = true;
        }
        hit
    }

    /// Overlap between `other`'s stored position and `self`'s projection at
    /// `now`. On a hit, starts self's death grace window.
    pub fn collide(&mut self, other: &GameObject, now: i64) -> bool {
        let dx = self.cur_x(now) - other.x;
        let dy = self.cur_y(now) - other.y;
        let r = self.size + other.size;
        let hit = dx * dx + dy * dy <= r * r;
        if hit {
            self.is_dead = true;
            self.time_update = now;
            self.life_length = DEATH_GRACE_MS;
        }
        hit
    }

    /// Applies damage, starting the death grace window if it proves fatal.
    /// Returns the `hit` frame to send to the damaged object's owner, if any
    /// (damage is only meaningful, and only reported, while still alive).
    pub fn hurt(&mut self, damage: i32, now: i64) -> ObjectRecord {
        self.health = (self.health - damage).max(0);
        if self.health == 0 {
            self.is_dead = true;
            self.time_update = now;
            self.life_length = DEATH_GRACE_MS;
        }
        self.encode(now)
    }

    /// The owning player id embedded in a snowball id of the canonical shape
    /// `snowball_<owner>_<seq>`. Any other id shape has no owner, and so can
    /// never match (and thus never self-damage) any player.
    pub fn owner_id(&self) -> Option<&str> {
        let mut parts = self.id.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("snowball"), Some(owner), Some(_seq)) => Some(owner),
            _ => None,
        }
    }

    /// Encodes the outbound per-object record: the projected position at
    /// `now`, not the stored anchor.
    pub fn encode(&self, now: i64) -> ObjectRecord {
        ObjectRecord {
            id: self.id.clone(),
            object_type: match self.kind {
                ObjectKind::Player => "player",
                ObjectKind::Snowball => "snowball",
            },
            username: self.username.clone(),
            position: crate::protocol::Vec2 {
                x: self.cur_x(now),
                y: self.cur_y(now),
            },
            velocity: crate::protocol::Vec2 {
                x: self.vx,
                y: self.vy,
            },
            size: self.size,
            charging: self.charging,
            expire_date: now + self.life_length,
            is_dead: self.is_dead,
            time_update: self.time_update,
            new_health: self.health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(id: &str, x: f64, y: f64) -> GameObject {
        let mut p = GameObject::new_player(id.to_string());
        p.x = x;
        p.y = y;
        p.size = 10.0;
        p
    }

    #[test]
    fn projection_is_identity_at_anchor() {
        let mut o = player_at("a", 5.0, 5.0);
        o.vx = 30.0;
        o.vy = -10.0;
        o.time_update = 1000;
        assert_eq!(o.cur_x(1000), 5.0);
        assert_eq!(o.cur_y(1000), 5.0);
    }

    #[test]
    fn projection_is_linear_in_time() {
        let mut o = player_at("a", 0.0, 0.0);
        o.vx = 100.0;
        o.time_update = 0;
        let d = o.cur_x(2500) - o.cur_x(500);
        assert!((d - 100.0 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn hurt_to_zero_starts_grace_window() {
        let mut o = player_at("a", 0.0, 0.0);
        o.health = 10;
        let record = o.hurt(10, 5_000);
        assert!(o.is_dead);
        assert_eq!(o.time_update, 5_000);
        assert_eq!(o.life_length, DEATH_GRACE_MS);
        assert_eq!(record.new_health, 0);
        assert!(record.is_dead);
    }

    #[test]
    fn hurt_survives_partial_damage() {
        let mut o = player_at("a", 0.0, 0.0);
        o.health = 100;
        let record = o.hurt(10, 5_000);
        assert!(!o.is_dead);
        assert_eq!(record.new_health, 90);
    }

    #[test]
    fn owner_id_extracted_from_canonical_shape() {
        let o = GameObject::new_snowball("snowball_alice_7".to_string());
        assert_eq!(o.owner_id(), Some("alice"));
    }

    #[test]
    fn owner_id_none_for_other_shapes() {
        let o = GameObject::new_player("alice".to_string());
        assert_eq!(o.owner_id(), None);
    }

    #[test]
    fn collide_uses_projected_self_and_stored_other() {
        let mut ball = player_at("snowball_b_1", 0.0, 0.0);
        ball.vx = 100.0;
        ball.time_update = 0;
        ball.size = 2.0;
        let target = player_at("a", 9.5, 0.0);
        assert!(ball.collide(&target, 100));
        assert!(ball.is_dead);
        assert_eq!(ball.life_length, DEATH_GRACE_MS);
    }
}
