// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core engine for the snowfight arena server: game object model, the
//! concurrent spatial grid, message handling, and the worker wiring that
//! drives it all from real WebSocket connections.

pub mod game_object;
pub mod grid;
pub mod handlers;
pub mod options;
pub mod protocol;
pub mod worker;
