pub mod handlers;
pub mod routes;

pub use handlers::{AppState, SharedState};
pub use routes::create_router;
