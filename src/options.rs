// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command-line surface: a single `structopt` struct with per-subsystem
//! log-level flags and no config file.

use log::LevelFilter;
use structopt::StructOpt;

/// Server options, to be specified as arguments.
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Port to listen on.
    #[structopt(short = "p", long, default_value = "12345")]
    pub port: u16,
    /// Number of sharded IO workers, each owning its own clients and
    /// snowballs and sharing only the spatial grid.
    #[structopt(short = "w", long, default_value = "4")]
    pub workers: usize,
    /// World width, in world units.
    #[structopt(long, default_value = "1600")]
    pub width: f64,
    /// World height, in world units.
    #[structopt(long, default_value = "1600")]
    pub height: f64,
    /// Grid cell side length, in world units.
    #[structopt(long, default_value = "100")]
    pub cell_size: f64,
    /// Log game/grid/worker diagnostics.
    #[cfg_attr(debug_assertions, structopt(long, default_value = "info"))]
    #[cfg_attr(not(debug_assertions), structopt(long, default_value = "warn"))]
    pub debug_game: LevelFilter,
    /// Log per-connection socket diagnostics.
    #[cfg_attr(debug_assertions, structopt(long, default_value = "warn"))]
    #[cfg_attr(not(debug_assertions), structopt(long, default_value = "error"))]
    pub debug_sockets: LevelFilter,
    /// Log actix-web's own HTTP diagnostics.
    #[cfg_attr(debug_assertions, structopt(long, default_value = "warn"))]
    #[cfg_attr(not(debug_assertions), structopt(long, default_value = "error"))]
    pub debug_http: LevelFilter,
}
