//! API Module
//!
//! HTTP handlers and routing for the relay REST API.
//!
//! # Endpoints
//! - `GET /health`, `GET /quota`, `GET /cache/stats`
//! - `DELETE /cache`, `DELETE /cache/channels/:channel_id`
//! - `POST /channels`, `GET /channels/search`
//! - `POST /channels/stream`, `POST /analysis/stream` (server-sent events)
//! - `POST /emails/validate`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
