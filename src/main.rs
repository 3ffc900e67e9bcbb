// SPDX-FileCopyrightText: 2021 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process entry point: CLI parsing, logging setup, and the actix-web
//! listener that shards connections across N independent workers.

use std::cell::Cell;
use std::sync::Arc;

use actix::Actor;
use actix_web::{web, App, Error, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use log::{error, info};
use structopt::StructOpt;

use snowfight_server::grid::Grid;
use snowfight_server::options::Options;
use snowfight_server::worker::{new_shared_state, Session, SharedState, Ticker};

thread_local! {
    static NEXT_CONN_ID: Cell<u64> = Cell::new(0);
}

fn next_conn_id() -> String {
    NEXT_CONN_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        format!("conn{id}")
    })
}

async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<SharedState>,
) -> Result<HttpResponse, Error> {
    let session = Session::new(next_conn_id(), state.get_ref().clone());
    ws::start(session, &req, stream)
}

fn main() {
    let options = Options::from_args();

    let mut logger = env_logger::builder();
    logger.format_timestamp(None);
    logger.filter_module(module_path!(), options.debug_game);
    logger.filter_module("snowfight_server", options.debug_game);
    logger.filter_module("snowfight_server::worker", options.debug_sockets);
    logger.filter_module("actix_web", options.debug_http);
    logger.filter_module("actix_server", options.debug_http);
    logger.init();

    let grid = Arc::new(Grid::new(options.width, options.height, options.cell_size));
    let port = options.port;
    let workers = options.workers;

    let result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            // Runs once per worker thread: the state built here is this
            // worker's own, never shared with any other worker.
            let state: SharedState = new_shared_state(Arc::clone(&grid));
            Ticker::new(state.clone()).start();

            App::new()
                .app_data(web::Data::new(state))
                .default_service(web::get().to(ws_index))
        })
        .workers(workers)
        .bind(("0.0.0.0", port))?
        .run()
        .await
    });

    match result {
        Ok(()) => {
            info!("server shut down cleanly");
        }
        Err(e) => {
            error!("failed to bind listener on port {}: {}", port, e);
            std::process::exit(1);
        }
    }
}
