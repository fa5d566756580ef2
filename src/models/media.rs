//! Represents a single media asset uploaded by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one uploaded (or externally referenced) image.
///
/// The record describes the asset; the bytes themselves live under the
/// storage root, except for pointer-only media whose `file_path` is a full
/// external URL.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Media {
    /// Internal UUID, assigned by the store on first insert.
    pub id: Uuid,

    /// Client-supplied filename. Only used to derive the extension.
    pub original_filename: String,

    /// MIME type. Always an `image/*` type for uploaded media.
    pub content_type: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Generated filename relative to the storage root, or a full
    /// `http(s)://` URL for media not hosted locally.
    pub file_path: String,

    /// Owning user. Immutable after creation.
    pub user_id: Uuid,

    /// Catalog product this media is attached to, if any.
    pub product_id: Option<Uuid>,

    /// Public address of the asset. Set once the record has an id.
    pub url: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// Last modification time, refreshed on association changes.
    pub updated_at: DateTime<Utc>,
}
