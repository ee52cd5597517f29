//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the transcode RPC endpoints
//! - Static serving of transcoded HLS output
//! - CORS middleware

pub mod handlers;
pub mod routes;

pub use routes::create_router;
