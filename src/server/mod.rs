//! Read-only JSON browse API over the local store.

use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::db::{self, AlbumSummary, LibraryStats};
use crate::model::{Album, Artist, Track};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn store_error(err: sqlx::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(target: "server", error = %err, "Store query failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("store error: {err}"))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct AlbumDetail {
    #[serde(flatten)]
    pub album: Album,
    pub artist: Option<Artist>,
    pub tracks: Vec<Track>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/artists", get(list_artists))
        .route("/api/artists/:artist_id", get(get_artist))
        .route("/api/artists/:artist_id/albums", get(list_artist_albums))
        .route("/api/albums/:album_id", get(get_album))
        .route("/api/search/artists", get(search_artists))
        .route("/api/search/albums", get(search_albums))
        .route("/api/search/tracks", get(search_tracks))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the browse API until Ctrl-C.
pub async fn serve(pool: SqlitePool, bind_addr: &str) -> std::io::Result<()> {
    let app = router(AppState { pool });
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(target: "server", "Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "server", "Failed to install Ctrl-C handler: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "server", "Shutting down");
}

pub async fn get_stats(State(state): State<AppState>) -> JsonResult<LibraryStats> {
    db::library_stats(&state.pool)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn list_artists(State(state): State<AppState>) -> JsonResult<Vec<Artist>> {
    db::get_all_artists(&state.pool)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn get_artist(
    State(state): State<AppState>,
    AxumPath(artist_id): AxumPath<i64>,
) -> JsonResult<Artist> {
    match db::get_artist(&state.pool, artist_id).await {
        Ok(Some(artist)) => Ok(Json(artist)),
        Ok(None) => Err(json_error(StatusCode::NOT_FOUND, "artist not found")),
        Err(err) => Err(store_error(err)),
    }
}

pub async fn list_artist_albums(
    State(state): State<AppState>,
    AxumPath(artist_id): AxumPath<i64>,
) -> JsonResult<Vec<Album>> {
    match db::get_artist(&state.pool, artist_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(json_error(StatusCode::NOT_FOUND, "artist not found")),
        Err(err) => return Err(store_error(err)),
    }
    db::albums_by_artist(&state.pool, artist_id)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn get_album(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<i64>,
) -> JsonResult<AlbumDetail> {
    let album = match db::get_album(&state.pool, album_id).await {
        Ok(Some(album)) => album,
        Ok(None) => return Err(json_error(StatusCode::NOT_FOUND, "album not found")),
        Err(err) => return Err(store_error(err)),
    };
    let artist = db::artist_of(&state.pool, album_id)
        .await
        .map_err(store_error)?;
    let tracks = db::tracks_of(&state.pool, album_id)
        .await
        .map_err(store_error)?;

    Ok(Json(AlbumDetail {
        album,
        artist,
        tracks,
    }))
}

pub async fn search_artists(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> JsonResult<Vec<Artist>> {
    db::search_artists(&state.pool, &params.q)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn search_albums(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> JsonResult<Vec<AlbumSummary>> {
    db::search_albums(&state.pool, &params.q)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn search_tracks(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> JsonResult<Vec<Track>> {
    db::search_tracks(&state.pool, &params.q)
        .await
        .map(Json)
        .map_err(store_error)
}
