//! Service layer: the media orchestrator and the collaborators it composes.

pub mod media_service;
pub mod media_store;
pub mod product_notifier;
pub mod storage_root;
