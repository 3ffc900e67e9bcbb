// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pure message handling and tick logic for one worker.
//!
//! Everything here operates on a [`WorkerState`] and a [`Connection`] sink;
//! neither type knows about actix or sockets, so the whole decision surface
//! (join/movement/ping routing, view_tick, object_tick) is unit-testable
//! without standing up a real listener. The thin actix wiring that drives
//! these functions from live connections lives in `worker.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::game_object::GameObject;
use crate::grid::{Grid, ObjectRef};
use crate::protocol::{
    BatchUpdateMessage, HitMessage, JoinMessage, MovementMessage, PingMessage, PongMessage,
};

/// How wide a player's view window extends on either side of them.
pub const FIXED_VIEW_WIDTH: f64 = 1600.0;
/// How tall a player's view window extends on either side of them.
pub const FIXED_VIEW_HEIGHT: f64 = 900.0;

/// The outbound half of a connection. Implemented for real sockets in
/// `worker.rs`; implemented by a recording stub in tests.
pub trait Connection {
    fn send_text(&self, text: String);
    fn send_binary(&self, bytes: Vec<u8>);
}

/// One connection owned by this worker: its Player object plus the sink to
/// push frames back out on.
pub struct ClientEntry<C> {
    pub player: ObjectRef,
    pub conn: C,
}

/// Everything one worker owns: the shared Grid handle, its connections, and
/// the snowballs its clients have thrown.
pub struct WorkerState<C> {
    pub grid: Arc<Grid>,
    pub clients: HashMap<String, ClientEntry<C>>,
    pub snowballs: HashMap<String, ObjectRef>,
}

impl<C> WorkerState<C> {
    pub fn new(grid: Arc<Grid>) -> Self {
        Self {
            grid,
            clients: HashMap::new(),
            snowballs: HashMap::new(),
        }
    }
}

/// Allocates a fresh, as-yet-unjoined Player for a newly accepted connection.
/// `conn_id` is a connection-scoped identifier, independent of whatever
/// player id `join` later assigns.
pub fn handle_open<C>(state: &mut WorkerState<C>, conn_id: String, conn: C) {
    let player = Arc::new(RwLock::new(GameObject::new_player(conn_id.clone())));
    state.clients.insert(conn_id, ClientEntry { player, conn });
}

/// Removes a connection's Player from the Grid and forgets the connection.
pub fn handle_close<C>(state: &mut WorkerState<C>, conn_id: &str) {
    if let Some(entry) = state.clients.remove(conn_id) {
        state.grid.remove(&entry.player);
    }
}

/// `ping` -> `pong` on the same connection, echoing the client's clock.
pub fn handle_ping<C: Connection>(conn: &C, msg: PingMessage, now: i64) {
    let pong = PongMessage::new(now, msg.client_time);
    if let Ok(text) = serde_json::to_string(&pong) {
        conn.send_text(text);
    }
}

/// Populates a connection's Player from a `join` frame and inserts it into
/// the Grid (a no-op if the position is out of bounds, per the Grid's own
/// bounds check).
pub fn handle_join<C>(
    state: &mut WorkerState<C>,
    conn_id: &str,
    msg: JoinMessage,
) -> Result<(), &'static str> {
    let entry = state.clients.get(conn_id).ok_or("join on unknown connection")?;
    {
        let mut p = entry.player.write();
        p.id = msg.id;
        p.username = msg.username;
        p.health = msg.health;
        p.size = msg.size;
        p.time_update = msg.time_update;
        p.x = msg.position.x;
        p.y = msg.position.y;
    }
    state.grid.insert(Arc::clone(&entry.player));
    Ok(())
}

/// Routes a `movement` frame to the player or snowball path by `objectType`.
pub fn handle_movement<C>(
    state: &mut WorkerState<C>,
    conn_id: &str,
    msg: MovementMessage,
    now: i64,
) -> Result<(), &'static str> {
    match msg.object_type.as_str() {
        "player" => handle_player_movement(state, conn_id, msg),
        "snowball" => handle_snowball_movement(state, msg),
        _ => {
            let _ = now;
            Err("unknown movement objectType")
        }
    }
}

fn handle_player_movement<C>(
    state: &mut WorkerState<C>,
    conn_id: &str,
    msg: MovementMessage,
) -> Result<(), &'static str> {
    let entry = state
        .clients
        .get(conn_id)
        .ok_or("movement on unknown connection")?;

    if let Some(direction) = msg.direction {
        let (vx, vy) = direction.to_velocity();
        let mut p = entry.player.write();
        p.vx = vx;
        p.vy = vy;
        p.time_update = msg.time_update;
        // Position is left untouched; the next cell transition in view_tick
        // or object_tick projects and re-anchors it.
        return Ok(());
    }

    if let Some(position) = msg.position {
        {
            let mut p = entry.player.write();
            p.x = position.x;
            p.y = position.y;
            p.time_update = msg.time_update;
        }
        state.grid.update(&entry.player, msg.time_update);
        return Ok(());
    }

    Err("player movement missing both direction and position")
}

fn handle_snowball_movement<C>(
    state: &mut WorkerState<C>,
    msg: MovementMessage,
) -> Result<(), &'static str> {
    let position = msg.position.ok_or("snowball movement missing position")?;
    let velocity = msg.velocity.unwrap_or_default();

    let is_new = !state.snowballs.contains_key(&msg.id);
    let obj = if is_new {
        let fresh = Arc::new(RwLock::new(GameObject::new_snowball(msg.id.clone())));
        state.snowballs.insert(msg.id.clone(), Arc::clone(&fresh));
        fresh
    } else {
        Arc::clone(state.snowballs.get(&msg.id).unwrap())
    };

    {
        let mut o = obj.write();
        o.x = position.x;
        o.y = position.y;
        o.vx = velocity.x;
        o.vy = velocity.y;
        if let Some(size) = msg.size {
            o.size = size;
        }
        if let Some(damage) = msg.damage {
            o.damage = damage;
        }
        if let Some(life_length) = msg.life_length {
            o.life_length = life_length;
        }
        o.charging = msg.charging;
        o.time_update = msg.time_update;
    }

    if is_new {
        state.grid.insert(Arc::clone(&obj));
    } else {
        state.grid.update(&obj, msg.time_update);
    }
    Ok(())
}

/// Runs every `PLAYER_TICK_MS`: for each owned connection, resolves
/// collisions against nearby snowballs and pushes a batched view.
pub fn view_tick<C: Connection>(state: &mut WorkerState<C>, now: i64) {
    let mut to_forget = Vec::new();

    for (conn_id, entry) in state.clients.iter() {
        let (is_dead, is_expired) = {
            let p = entry.player.read();
            (p.is_dead, p.expired(now))
        };

        if is_expired {
            state.grid.remove(&entry.player);
            to_forget.push(conn_id.clone());
            continue;
        }
        if is_dead {
            // Within its death grace window: stop sending this connection
            // anything further, but leave it indexed so other connections'
            // view_ticks still see its last (dead) state at least once.
            continue;
        }

        // Players moved purely by direction input only have vx,vy,time_update
        // set (handle_player_movement's direction-vector branch); this is
        // where that deferred re-anchor and reindex actually happens.
        state.grid.update(&entry.player, now);

        let (x, y) = {
            let p = entry.player.read();
            (p.x, p.y)
        };
        let neighbors = state.grid.search(
            y - FIXED_VIEW_HEIGHT,
            y + FIXED_VIEW_HEIGHT,
            x - FIXED_VIEW_WIDTH,
            x + FIXED_VIEW_WIDTH,
        );

        let self_id = entry.player.read().id.clone();
        let mut batch = Vec::with_capacity(neighbors.len());

        for obj in neighbors {
            if Arc::ptr_eq(&obj, &entry.player) {
                continue;
            }

            let (damage, owner, obj_is_dead, obj_expired) = {
                let o = obj.read();
                (
                    o.damage,
                    o.owner_id().map(str::to_string),
                    o.is_dead,
                    o.expired(now),
                )
            };

            if obj_is_dead && obj_expired {
                continue;
            }

            if !obj_is_dead && damage > 0 && owner.as_deref() != Some(self_id.as_str()) {
                let player_snapshot = entry.player.read().clone();
                let hit = obj.write().collide(&player_snapshot, now);
                if hit {
                    let record = entry.player.write().hurt(damage, now);
                    entry
                        .conn
                        .send_text(serde_json::to_string(&HitMessage::new(record)).unwrap_or_default());
                    continue;
                }
            }

            batch.push(obj.read().encode(now));
        }

        let frame = BatchUpdateMessage::new(now, batch);
        if let Ok(bytes) = frame.encode_binary() {
            entry.conn.send_binary(bytes);
        }
    }

    for conn_id in to_forget {
        state.clients.remove(&conn_id);
    }
}

/// Runs every `OBJECT_TICK_MS`: advances or culls every snowball this
/// worker's clients have thrown.
pub fn object_tick<C>(state: &mut WorkerState<C>, now: i64) {
    let mut to_forget = Vec::new();

    for (id, obj) in state.snowballs.iter() {
        let (is_dead, is_expired) = {
            let o = obj.read();
            (o.is_dead, o.expired(now))
        };
        if is_dead || is_expired {
            state.grid.remove(obj);
            to_forget.push(id.clone());
        } else {
            state.grid.update(obj, now);
        }
    }

    for id in to_forget {
        state.snowballs.remove(&id);
    }
}
