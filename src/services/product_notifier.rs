//! src/services/product_notifier.rs
//!
//! Outbound seam to the product catalog. When a media item that is attached
//! to a product gets deleted here, the catalog is told to drop its side of
//! the association. Single attempt, no retry; the caller decides whether a
//! failure matters (it never does — deletion proceeds regardless).

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("product service returned {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Best-effort notification that a media item was removed.
#[async_trait]
pub trait ProductNotifier: Send + Sync {
    async fn media_removed(&self, product_id: Uuid, media_id: Uuid) -> Result<(), NotifyError>;
}

/// Calls the product service's media-removal endpoint over HTTP.
#[derive(Clone, Debug)]
pub struct HttpProductNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductNotifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ProductNotifier for HttpProductNotifier {
    async fn media_removed(&self, product_id: Uuid, media_id: Uuid) -> Result<(), NotifyError> {
        let url = format!(
            "{}/products/{}/remove-media/{}",
            self.base_url.trim_end_matches('/'),
            product_id,
            media_id
        );
        debug!("notifying product service at {}", url);

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(())
    }
}
