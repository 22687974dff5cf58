pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::{create_router, AppState, SharedState};

// Export logic types
pub use logic::{CopyError, CopyOperations, CopyOptions, MoveError, UseCase};

// Export all model types
pub use model::*;

// Export store types
pub use store::{CopySessionCache, MemoryStore, NodeStore};

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level only (suppress DEBUG logs)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    // Load configuration
    let config = crate::config::AppConfig::load()?;

    let state = Arc::new(AppState {
        store: MemoryStore::new(),
        ops: CopyOperations::new(Arc::new(CopySessionCache::new())),
    });

    let app = create_router().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
