use std::sync::Arc;

use tracing::info;

use ajchat_db::{Database, Stores};
use ajchat_gateway::{Dispatcher, SessionRegistry};
use ajchat_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ajchat=debug,ajchat_server=debug,ajchat_gateway=debug,ajchat_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Refuse to serve without a working store
    let db = Database::open(&config.db_path)?;
    let stores = Stores::new(Arc::new(db));

    let registry = Arc::new(SessionRegistry::new());
    let dispatcher = Dispatcher::with_history_limit(registry, stores, config.history_limit);

    let app = ajchat_server::app(dispatcher, &config.public_dir);

    let addr = config.addr()?;
    info!("aJ Chat listening on {} (static files from {})", addr, config.public_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
