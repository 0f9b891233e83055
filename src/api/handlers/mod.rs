//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Conversation creation and message listing handlers.
pub mod conversations;
/// Health check handler.
pub mod health;
/// Research streaming handler.
pub mod research;
