// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP front end for shorturl.
//!
//! Thin routing over a [`StoreFacade`]: handlers never know whether they
//! talk to the authoritative store or to a caching proxy.
//!
//! Routes:
//! - `POST /put` (form `url`) - shorten a url
//! - `GET|POST /get` (query/form `key`) - look a key up
//! - `GET /{key}` - 302 redirect to the stored url
//! - `DELETE /{key}` - tombstone a key (authority only)
//! - `POST /rpc/put`, `POST /rpc/get` - JSON calls used by proxies (when enabled)
//! - `GET /metrics` - Prometheus text format

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::trace::TraceLayer;

use shorturl_core::{StoreError, StoreFacade, UrlStore};

use crate::metrics;
use crate::rpc::{GetReply, GetRequest, PutReply, PutRequest, RpcFault};

/// State shared by all handlers.
struct AppState<R> {
    store: Arc<StoreFacade<R>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UrlForm {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct KeyForm {
    #[serde(default)]
    key: String,
}

/// Build the router. `rpc` mounts the endpoints proxies call.
pub fn router<R>(store: Arc<StoreFacade<R>>, rpc: bool) -> Router
where
    R: UrlStore + 'static,
{
    let mut key_route = get(redirect::<R>);
    if store.authority().is_some() {
        key_route = key_route.delete(delete_key::<R>);
    }

    let mut app = Router::new()
        .route("/put", post(put_form::<R>))
        .route("/get", get(get_query::<R>).post(get_form::<R>))
        .route("/metrics", get(metrics_text::<R>))
        .route("/{key}", key_route);

    if rpc {
        app = app
            .route("/rpc/put", post(rpc_put::<R>))
            .route("/rpc/get", post(rpc_get::<R>));
    }

    app.layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

/// Serve `app` on `addr` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<A, F>(addr: A, app: Router, shutdown: F) -> std::io::Result<()>
where
    A: ToSocketAddrs,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::KeyNotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::RemoteUnavailable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &StoreError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Store operation failed");
    }
    (status, err.to_string()).into_response()
}

fn rpc_error_response(err: &StoreError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "RPC store operation failed");
    }
    (status, Json(RpcFault::from(err))).into_response()
}

async fn put_form<R: UrlStore>(
    State(state): State<AppState<R>>,
    Form(form): Form<UrlForm>,
) -> Response {
    if form.url.is_empty() {
        return (StatusCode::BAD_REQUEST, "url can not be ''").into_response();
    }

    let result = state.store.put(&form.url).await;
    metrics::observe("put", &result);
    match result {
        Ok(key) => format!("shortURL(short: long) is {}: {}\n", key, form.url).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn lookup<R: UrlStore>(state: &AppState<R>, key: &str) -> Response {
    if key.is_empty() {
        return (StatusCode::BAD_REQUEST, "key can not be ''").into_response();
    }

    let result = state.store.get(key).await;
    metrics::observe("get", &result);
    match result {
        Ok(url) => format!("shortURL(short: long) is {}: {}\n", key, url).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_query<R: UrlStore>(
    State(state): State<AppState<R>>,
    Query(form): Query<KeyForm>,
) -> Response {
    lookup(&state, &form.key).await
}

async fn get_form<R: UrlStore>(
    State(state): State<AppState<R>>,
    Form(form): Form<KeyForm>,
) -> Response {
    lookup(&state, &form.key).await
}

async fn redirect<R: UrlStore>(
    State(state): State<AppState<R>>,
    Path(key): Path<String>,
) -> Response {
    let result = state.store.get(&key).await;
    metrics::observe("redirect", &result);
    match result {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_key<R: UrlStore>(
    State(state): State<AppState<R>>,
    Path(key): Path<String>,
) -> Response {
    let Some(authority) = state.store.authority() else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let result = authority.delete(&key).await;
    metrics::observe("delete", &result);
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn rpc_put<R: UrlStore>(
    State(state): State<AppState<R>>,
    Json(request): Json<PutRequest>,
) -> Response {
    let result = state.store.put(&request.url).await;
    metrics::observe("rpc_put", &result);
    match result {
        Ok(key) => Json(PutReply { key }).into_response(),
        Err(e) => rpc_error_response(&e),
    }
}

async fn rpc_get<R: UrlStore>(
    State(state): State<AppState<R>>,
    Json(request): Json<GetRequest>,
) -> Response {
    let result = state.store.get(&request.key).await;
    metrics::observe("rpc_get", &result);
    match result {
        Ok(url) => Json(GetReply { url }).into_response(),
        Err(e) => rpc_error_response(&e),
    }
}

async fn metrics_text<R: UrlStore>(State(state): State<AppState<R>>) -> String {
    metrics::render(state.store.local_count(), state.store.cache_stats())
}
