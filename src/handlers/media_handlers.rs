//! HTTP handlers for the media surface.
//!
//! Parses requests, extracts the caller identity forwarded by the gateway,
//! and delegates everything else to `MediaService`. Local media streams out
//! through `ReaderStream`; pointer-only media answers with a redirect.

use crate::{
    errors::AppError,
    services::media_service::{MediaService, MediaSource, MediaUpload},
};
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, Multipart, Path, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Header the trusted gateway forwards the authenticated user's id in.
const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the gateway-forwarded header.
#[derive(Clone, Copy, Debug)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(CallerId)
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::UNAUTHORIZED,
                    format!("missing or invalid {} header", USER_ID_HEADER),
                )
            })
    }
}

/// Request body for `DELETE /media`.
#[derive(Debug, Deserialize)]
pub struct DeleteByIdsReq {
    pub ids: Vec<Uuid>,
}

/// `POST /media` — multipart upload with a single `file` field.
pub async fn upload_media(
    State(service): State<MediaService>,
    CallerId(user_id): CallerId,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload: Option<MediaUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        upload = Some(MediaUpload {
            original_filename,
            content_type,
            data,
        });
        break;
    }

    let upload = upload.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, "multipart field `file` is required")
    })?;

    let media = service.upload(upload, user_id).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

/// `GET /media` — list the caller's media.
pub async fn list_media(
    State(service): State<MediaService>,
    CallerId(user_id): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let media = service.find_by_user(user_id).await?;
    Ok(Json(media))
}

/// `GET /images/{id}` — stream local bytes, or redirect to the external URL
/// for pointer-only media.
pub async fn get_image(
    State(service): State<MediaService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let resource = service.get_resource(id).await?;

    match resource.source {
        MediaSource::External(url) => Ok(Redirect::temporary(&url).into_response()),
        MediaSource::Local(file) => {
            let body = Body::from_stream(ReaderStream::new(file));
            let mut response = Response::new(body);
            let content_type = HeaderValue::from_str(&resource.content_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream"));
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            Ok(response)
        }
    }
}

/// `PUT /media/{id}/product/{product_id}` — attach a media item to a product.
pub async fn associate_media(
    State(service): State<MediaService>,
    CallerId(caller_id): CallerId,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let media = service.associate(id, product_id, caller_id).await?;
    Ok(Json(media))
}

/// `DELETE /media/{id}` — authorized single-item delete.
pub async fn delete_media(
    State(service): State<MediaService>,
    CallerId(caller_id): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete(id, caller_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /media` — batch delete by explicit id list.
pub async fn delete_media_by_ids(
    State(service): State<MediaService>,
    Json(req): Json<DeleteByIdsReq>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_by_ids(&req.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /media/user/{user_id}` — cascade delete by owner.
pub async fn delete_media_by_user(
    State(service): State<MediaService>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_by_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /media/product/{product_id}` — cascade delete by product.
pub async fn delete_media_by_product(
    State(service): State<MediaService>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_by_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
