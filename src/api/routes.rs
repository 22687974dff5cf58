use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::handlers::{self, SharedState};
use crate::store::NodeStore;

pub fn create_router<S: NodeStore + 'static>() -> Router<SharedState<S>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/nodes",
            get(handlers::list_nodes::<S>).post(handlers::create_node::<S>),
        )
        .route(
            "/nodes/:id",
            get(handlers::get_node::<S>).delete(handlers::delete_node::<S>),
        )
        .route("/copy", post(handlers::copy_node::<S>))
        .route("/move", post(handlers::move_node::<S>))
        .route(
            "/copy-sessions/:session",
            delete(handlers::clear_copy_session::<S>),
        )
}
