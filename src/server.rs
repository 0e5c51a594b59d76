//! The HTTP run trigger.
//!
//! `GET|POST /sync-sheets` runs one sync and answers with its outcome, `GET /health` answers
//! `{"status":"ok"}`. Runs are serialized: a trigger that arrives while a run is in progress waits
//! for it to finish.

use crate::api::Mode;
use crate::sync::Syncer;
use crate::{Config, Result};
use anyhow::Context;
use chrono::Local;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const SYNC_PATH: &str = "/sync-sheets";
const HEALTH_PATH: &str = "/health";

/// What a request asks for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Route {
    Sync,
    Health,
    MethodNotAllowed,
    NotFound,
}

/// Maps a request line to a `Route`. A trailing slash is ignored.
pub fn route(method: &Method, path: &str) -> Route {
    let path = match path.strip_suffix('/') {
        Some(p) if !p.is_empty() => p,
        _ => path,
    };
    match path {
        SYNC_PATH if method == Method::GET || method == Method::POST => Route::Sync,
        HEALTH_PATH if method == Method::GET => Route::Health,
        SYNC_PATH | HEALTH_PATH => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

/// Shared by every connection.
struct State {
    config: Config,
    mode: Mode,
    run_lock: Mutex<()>,
}

/// Accepts connections on `addr` until Ctrl-C is received.
pub async fn serve(config: Config, mode: Mode, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;
    info!("Listening on http://{addr}");

    let state = Arc::new(State {
        config,
        mode,
        run_lock: Mutex::new(()),
    });

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted.context("Unable to accept a connection")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        };
        debug!("Connection from {peer}");

        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(respond(&state, req.method(), req.uri().path()).await) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {peer} ended with an error: {e}");
            }
        });
    }
}

async fn respond(state: &State, method: &Method, path: &str) -> Response<Full<Bytes>> {
    debug!("{method} {path}");
    match route(method, path) {
        Route::Health => json_response(StatusCode::OK, json!({"status": "ok"})),
        Route::Sync => run_sync(state).await,
        Route::MethodNotAllowed => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"status": "error", "message": format!("Method {method} not allowed for {path}")}),
        ),
        Route::NotFound => json_response(
            StatusCode::NOT_FOUND,
            json!({"status": "error", "message": format!("Not found: {path}")}),
        ),
    }
}

async fn run_sync(state: &State) -> Response<Full<Bytes>> {
    let _guard = state.run_lock.lock().await;
    let result = async {
        let mut syncer = Syncer::from_config(&state.config, state.mode).await?;
        syncer.run(Local::now().naive_local()).await
    }
    .await;

    match result {
        Ok(outcome) => json_response(
            StatusCode::OK,
            json!({"status": "success", "message": "Sync completed", "outcome": outcome}),
        ),
        Err(e) => {
            error!("Triggered sync failed: {e:#}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": format!("{e:#}")}),
            )
        }
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
