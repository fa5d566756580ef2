//! HTTP layer: request parsing, caller identity, and response shaping.

pub mod health_handlers;
pub mod media_handlers;
