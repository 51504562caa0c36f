pub mod auth;
pub mod context;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod health;
pub mod server;
pub mod state;

pub use auth::Authenticator;
pub use health::Health;
pub use server::{build_router, start_server};
pub use state::AppState;
