pub mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::ai::generate as ai_generate;
pub use handlers::core::open_database;
pub use router::handle_request;
pub use types::{AppState, Request};
