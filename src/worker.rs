// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wires the pure handlers in `handlers.rs` to real WebSocket connections.
//!
//! Each `HttpServer` worker builds its own [`WorkerState`], captured by the
//! per-worker `App` factory closure and shared only with the actors that
//! factory spawns. That is what makes the client set and snowball map
//! genuinely thread-local instead of funneled through a single mailbox: the
//! factory closure runs once per OS thread, so the `Rc<RefCell<..>>` it
//! builds never crosses a thread boundary.
//!
//! The per-connection actor decodes text frames with `serde_json`, forwards
//! them to the owning worker's handlers, and exposes an outbound path the
//! handlers' `Connection` trait calls into.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use actix::prelude::*;
use actix_web_actors::ws;
use log::{debug, warn};

use crate::grid::Grid;
use crate::handlers::{self, Connection, WorkerState};
use crate::protocol::{ClientMessage, PingMessage, PING_FAST_PATH_TOKEN};

/// How often `view_tick` runs.
pub const PLAYER_TICK_MS: u64 = 10;
/// How often `object_tick` runs.
pub const OBJECT_TICK_MS: u64 = 30;

/// Server wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(_) => 0,
    }
}

/// This worker's state: the process-wide shared [`Grid`] (reached via
/// `Arc`, the one piece of state that does cross thread boundaries) plus
/// the thread-local client set and snowball map `WorkerState` owns.
pub type SharedState = Rc<RefCell<WorkerState<Addr<Session>>>>;

pub fn new_shared_state(grid: Arc<Grid>) -> SharedState {
    Rc::new(RefCell::new(WorkerState::new(grid)))
}

/// Push a frame to a connected client's actor mailbox; the actor writes it
/// out on its own WebSocket context from there.
#[derive(Message)]
#[rtype(result = "()")]
struct OutboundText(String);

#[derive(Message)]
#[rtype(result = "()")]
struct OutboundBinary(Vec<u8>);

impl Connection for Addr<Session> {
    fn send_text(&self, text: String) {
        self.do_send(OutboundText(text));
    }

    fn send_binary(&self, bytes: Vec<u8>) {
        self.do_send(OutboundBinary(bytes));
    }
}

/// One accepted WebSocket connection. Lifecycle hooks map directly onto
/// `open`/`message`/`close` handling.
pub struct Session {
    conn_id: String,
    state: SharedState,
}

impl Session {
    pub fn new(conn_id: String, state: SharedState) -> Self {
        Self { conn_id, state }
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let now = now_ms();

        // Optimistic fast path: a ping never needs the full tagged decode.
        if text.contains(PING_FAST_PATH_TOKEN) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
                if value.get("type").and_then(|t| t.as_str()) == Some("ping") {
                    if let Some(client_time) = value.get("clientTime").and_then(|t| t.as_i64()) {
                        handlers::handle_ping(&ctx.address(), PingMessage { client_time }, now);
                        return;
                    }
                }
            }
        }

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Ping(msg)) => {
                handlers::handle_ping(&ctx.address(), msg, now);
            }
            Ok(ClientMessage::Join(msg)) => {
                if let Err(e) = handlers::handle_join(&mut self.state.borrow_mut(), &self.conn_id, msg) {
                    warn!("join rejected: {}", e);
                }
            }
            Ok(ClientMessage::Movement(msg)) => {
                if let Err(e) =
                    handlers::handle_movement(&mut self.state.borrow_mut(), &self.conn_id, msg, now)
                {
                    warn!("movement frame ignored: {}", e);
                }
            }
            Err(e) => {
                debug!("malformed frame ignored: {}", e);
            }
        }
    }
}

impl Actor for Session {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        handlers::handle_open(&mut self.state.borrow_mut(), self.conn_id.clone(), addr);
        debug!("connection opened: {}", self.conn_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        handlers::handle_close(&mut self.state.borrow_mut(), &self.conn_id);
        debug!("connection closed: {}", self.conn_id);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for Session {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_text(text.as_ref(), ctx),
            Ok(ws::Message::Binary(_)) => {
                debug!("ignoring unexpected binary inbound frame");
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<OutboundText> for Session {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<OutboundBinary> for Session {
    type Result = ();

    fn handle(&mut self, msg: OutboundBinary, ctx: &mut Self::Context) {
        ctx.binary(msg.0);
    }
}

/// Drives this worker's two periodic ticks. One instance lives per worker,
/// alongside the [`SharedState`] it was built from.
pub struct Ticker {
    state: SharedState,
}

impl Ticker {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl Actor for Ticker {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let view_state = Rc::clone(&self.state);
        ctx.run_interval(Duration::from_millis(PLAYER_TICK_MS), move |_, _| {
            handlers::view_tick(&mut view_state.borrow_mut(), now_ms());
        });

        let object_state = Rc::clone(&self.state);
        ctx.run_interval(Duration::from_millis(OBJECT_TICK_MS), move |_, _| {
            handlers::object_tick(&mut object_state.borrow_mut(), now_ms());
        });
    }
}
