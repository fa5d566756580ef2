//! Core data model for the media management service.
//!
//! The `Media` entity maps to its database table via `sqlx::FromRow` and
//! serializes naturally as JSON via `serde`.

pub mod media;
