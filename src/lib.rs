// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
pub mod validation;

// Re-export specific items for convenience if needed
pub use routes::create_router;
