pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod tree;

// Re-export commonly used items for tests / external users
pub use routes::{config, cors, AppState};
pub use tree::{build_tree, ReplyForest, ReplyNode};
