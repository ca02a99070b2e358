pub mod auth;
pub mod bump;
pub mod error;
pub mod guard;
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod settings;

// Re-export commonly used items for tests / external users
pub use bump::{BumpError, BumpOutcome, BumpResetOperation};
pub use guard::StaffGuard;
pub use routes::{config, AppState};
pub use settings::Settings;
