use std::sync::Arc;

pub mod auth;
pub mod bus;
pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod errors;
pub mod mocks;
pub mod models;
pub mod routes;
pub mod scheduler;

use client::user::UserClient;
use coordinator::Coordinator;

/// Shared handles for the HTTP layer. Everything in here is cheap to clone
/// and safe for concurrent use.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub users: Arc<dyn UserClient>,
}
