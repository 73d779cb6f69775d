pub mod page;
pub mod routes;

use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use axum::Router;
use rust_embed::RustEmbed;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::info;

#[derive(RustEmbed)]
#[folder = "assets"]
struct StaticAssets;

pub async fn run_server(config: Arc<Config>, database: Database) -> Result<()> {
    let port = config.api_port;
    let state = routes::AppState {
        config,
        database: Arc::new(Mutex::new(database)),
        sessions: Arc::new(SessionStore::default()),
    };
    let app: Router = routes::router(state);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "DayCheck server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}

pub fn get_embedded_asset(path: &str) -> Option<(Vec<u8>, String)> {
    let requested = path.trim_start_matches('/');

    StaticAssets::get(requested).map(|content| {
        let mime = mime_guess::from_path(requested)
            .first_or_octet_stream()
            .to_string();
        (content.data.into_owned(), mime)
    })
}
