// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire schema. Inbound control traffic is UTF-8 JSON; outbound
//! `batch_update` frames are binary MessagePack maps.
//!
//! Field names are pinned by the wire contract, hence the liberal
//! `#[serde(rename...)]` use.

use serde::{Deserialize, Serialize};

/// A plain 2D vector, used both for position and velocity on the wire.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// The boolean direction set a player movement frame may carry.
#[derive(Copy, Clone, Debug, Default, Deserialize)]
pub struct Direction {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
}

impl Direction {
    /// Derives `(vx, vy)` at [`crate::game_object::PLAYER_SPEED`], halving
    /// diagonals by `1/sqrt(2)` so diagonal movement isn't faster.
    pub fn to_velocity(self) -> (f64, f64) {
        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.left {
            dx -= 1.0;
        }
        if self.right {
            dx += 1.0;
        }
        if self.up {
            dy -= 1.0;
        }
        if self.down {
            dy += 1.0;
        }
        if dx != 0.0 && dy != 0.0 {
            let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
            dx *= inv_sqrt2;
            dy *= inv_sqrt2;
        }
        (
            dx * crate::game_object::PLAYER_SPEED,
            dy * crate::game_object::PLAYER_SPEED,
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub id: String,
    #[serde(default = "default_username")]
    pub username: String,
    pub position: Vec2,
    #[serde(default = "default_health")]
    pub health: i32,
    #[serde(default = "default_size")]
    pub size: f64,
    #[serde(default)]
    pub time_update: i64,
}

fn default_username() -> String {
    "unknown".to_string()
}
fn default_health() -> i32 {
    100
}
fn default_size() -> f64 {
    20.0
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementMessage {
    pub object_type: String,
    pub id: String,
    #[serde(default)]
    pub time_update: i64,
    /// Player movement, direction-vector variant.
    pub direction: Option<Direction>,
    /// Player movement, explicit-position variant; also used (required) by
    /// the snowball variant.
    pub position: Option<Vec2>,
    /// Snowball-only fields.
    pub velocity: Option<Vec2>,
    pub size: Option<f64>,
    pub damage: Option<i32>,
    #[serde(default)]
    pub charging: bool,
    pub life_length: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    pub client_time: i64,
}

/// An inbound frame, tagged by its `type` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping(PingMessage),
    Join(JoinMessage),
    Movement(MovementMessage),
}

/// The literal substring a raw frame must contain for the ping fast path.
/// Correctness never depends on this; it is purely a decode-skip heuristic.
pub const PING_FAST_PATH_TOKEN: &str = "\"ping\"";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub message_type: &'static str,
    pub server_time: i64,
    pub client_time: i64,
}

impl PongMessage {
    pub fn new(server_time: i64, client_time: i64) -> Self {
        Self {
            message_type: "pong",
            server_time,
            client_time,
        }
    }
}

/// The per-object record embedded in both `hit` and `batch_update` frames.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub id: String,
    pub object_type: &'static str,
    pub username: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f64,
    pub charging: bool,
    pub expire_date: i64,
    pub is_dead: bool,
    pub time_update: i64,
    pub new_health: i32,
}

/// A `hit` frame: one per applied damage event, sent as text JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitMessage {
    pub message_type: &'static str,
    #[serde(flatten)]
    pub object: ObjectRecord,
}

impl HitMessage {
    pub fn new(object: ObjectRecord) -> Self {
        Self {
            message_type: "hit",
            object,
        }
    }
}

/// A `batch_update` frame: one per view tick per connection, sent as a
/// binary MessagePack map.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateMessage {
    pub message_type: &'static str,
    pub timestamp: i64,
    pub updates: Vec<ObjectRecord>,
}

impl BatchUpdateMessage {
    pub fn new(timestamp: i64, updates: Vec<ObjectRecord>) -> Self {
        Self {
            message_type: "batch_update",
            timestamp,
            updates,
        }
    }

    /// Encodes this frame the way the wire contract pins it: a compact
    /// binary MessagePack map.
    pub fn encode_binary(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_movement_is_not_faster() {
        let d = Direction {
            left: true,
            up: true,
            ..Default::default()
        };
        let (vx, vy) = d.to_velocity();
        let speed = (vx * vx + vy * vy).sqrt();
        assert!((speed - crate::game_object::PLAYER_SPEED).abs() < 1e-9);
    }

    #[test]
    fn opposing_directions_cancel() {
        let d = Direction {
            left: true,
            right: true,
            ..Default::default()
        };
        assert_eq!(d.to_velocity(), (0.0, 0.0));
    }

    #[test]
    fn decodes_tagged_inbound_messages() {
        let ping: ClientMessage =
            serde_json::from_str(r#"{"type":"ping","clientTime":1000}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping(_)));

        let join: ClientMessage = serde_json::from_str(
            r#"{"type":"join","id":"a","position":{"x":1.0,"y":2.0}}"#,
        )
        .unwrap();
        assert!(matches!(join, ClientMessage::Join(_)));
    }

    #[test]
    fn batch_update_round_trips_through_messagepack() {
        let frame = BatchUpdateMessage::new(
            42,
            vec![ObjectRecord {
                id: "a".to_string(),
                object_type: "player",
                username: "alice".to_string(),
                position: Vec2 { x: 1.0, y: 2.0 },
                velocity: Vec2 { x: 0.0, y: 0.0 },
                size: 20.0,
                charging: false,
                expire_date: 100,
                is_dead: false,
                time_update: 10,
                new_health: 100,
            }],
        );
        let bytes = frame.encode_binary().unwrap();
        assert!(!bytes.is_empty());
        let value: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value["messageType"], "batch_update");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["updates"][0]["id"], "a");
    }
}
