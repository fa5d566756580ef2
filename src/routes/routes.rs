//! Defines routes for the media management surface.
//!
//! ## Structure
//! - **Media endpoints**
//!   - `POST   /media` — multipart upload (`file` field)
//!   - `GET    /media` — list the caller's media
//!   - `DELETE /media` — batch delete, JSON body `{"ids": [...]}`
//!   - `DELETE /media/{id}` — authorized single delete
//!   - `PUT    /media/{id}/product/{product_id}` — associate with a product
//!   - `DELETE /media/user/{user_id}` — cascade delete by owner
//!   - `DELETE /media/product/{product_id}` — cascade delete by product
//!
//! - **Content endpoint**
//!   - `GET    /images/{id}` — stream local bytes or redirect to the
//!     external URL for pointer-only media

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        media_handlers::{
            associate_media, delete_media, delete_media_by_ids, delete_media_by_product,
            delete_media_by_user, get_image, list_media, upload_media,
        },
    },
    services::media_service::MediaService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Request bodies may exceed the stored-file ceiling by the multipart
/// framing overhead; the limit sits above the cap so oversized uploads are
/// rejected by the service's own validation rather than the framework.
const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Build and return the router for all media routes.
///
/// The router carries shared state (`MediaService`) to all handlers.
pub fn routes() -> Router<MediaService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // media metadata surface
        .route(
            "/media",
            post(upload_media).get(list_media).delete(delete_media_by_ids),
        )
        .route("/media/{id}", delete(delete_media))
        .route("/media/{id}/product/{product_id}", put(associate_media))
        .route("/media/user/{user_id}", delete(delete_media_by_user))
        .route("/media/product/{product_id}", delete(delete_media_by_product))
        // content surface
        .route("/images/{id}", get(get_image))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}
