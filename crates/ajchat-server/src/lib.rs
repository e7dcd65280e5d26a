pub mod config;

use std::path::Path;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use ajchat_gateway::Dispatcher;
use ajchat_gateway::connection;

/// `/ws` for the chat gateway; everything else is a static file, with
/// `index.html` for paths that don't exist.
pub fn app(dispatcher: Dispatcher, public_dir: &Path) -> Router {
    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(dispatcher);

    let static_files = ServeDir::new(public_dir)
        .fallback(ServeFile::new(public_dir.join("index.html")));

    Router::new()
        .merge(ws_route)
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(dispatcher): State<Dispatcher>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}
