//! HTTP API handlers and routes.
//!
//! The thin transport layer over the research core, built on Axum.
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research` - Run a research request; the response is a
//!   Server-Sent Events stream of progress, sources, synthesis tokens, and a
//!   terminal `done` event
//!
//! ## Conversations (`/api/conversations`)
//! - `POST /api/conversations` - Create a conversation
//! - `GET /api/conversations/{id}/messages` - List a conversation's messages
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
