use axum::serve;
use itp_catalog_rust::api::{create_router, AppState};
use itp_catalog_rust::config::AppConfig;
use itp_catalog_rust::logic::CopyOperations;
use itp_catalog_rust::store::{CopySessionCache, MemoryStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("ITP-Catalog: Test Integration Catalog Server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let state = Arc::new(AppState {
        store: MemoryStore::new(),
        ops: CopyOperations::new(Arc::new(CopySessionCache::new())),
    });

    let app = create_router().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("ITP-Catalog server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
