// Oxidized Analyst - Conversational CSV analysis backed by an LLM

pub mod config;
pub mod models;
pub mod types;
pub mod llm;
pub mod routes;
pub mod middleware;
pub mod utils;
pub mod table;     // Plain-text table rendering for previews and prompts
pub mod dataset;   // CSV loading and column typing
pub mod stats;     // describe()-style summary statistics
pub mod prompt;
pub mod plot;
pub mod session;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use session::{Session, SessionRegistry};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
