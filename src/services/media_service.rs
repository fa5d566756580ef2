//! src/services/media_service.rs
//!
//! MediaService — upload, retrieval, product association, and deletion of
//! media assets. Composes the record store, the storage root, and the
//! product notifier behind one request-facing surface that enforces
//! validation and ownership.
//!
//! Deletion is deliberately lopsided: input and authorization errors fail a
//! request immediately, while filesystem and remote-service failures during
//! a delete are logged and absorbed so local records can always be removed.

use crate::{
    models::media::Media,
    services::{
        media_store::{MediaStore, NewMedia},
        product_notifier::ProductNotifier,
        storage_root::{StorageRoot, StorageRootError},
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, warn};
use uuid::Uuid;

/// Hard ceiling on uploaded file size (2 MiB).
pub const MAX_FILE_SIZE: i64 = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("cannot store an empty file")]
    EmptyFile,
    #[error("file size {0} exceeds the {max} byte limit", max = MAX_FILE_SIZE)]
    FileTooLarge(i64),
    #[error("unsupported content type `{0}`: only image uploads are accepted")]
    NotAnImage(String),
    #[error("media `{0}` not found")]
    MediaNotFound(Uuid),
    #[error("stored file for media `{0}` is missing or unreadable")]
    FileMissing(Uuid),
    #[error("media `{0}` is not owned by the caller")]
    NotOwner(Uuid),
    #[error(transparent)]
    Storage(#[from] StorageRootError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// An uploaded file as received from the client.
#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub original_filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Byte source for a stored media item.
#[derive(Debug)]
pub enum MediaSource {
    /// Open handle to a file under the storage root.
    Local(File),
    /// Address of media hosted elsewhere; never read locally.
    External(String),
}

/// A media item's byte source paired with its content type.
#[derive(Debug)]
pub struct MediaResource {
    pub source: MediaSource,
    pub content_type: String,
}

/// Request-facing media operations, shared as axum state.
#[derive(Clone)]
pub struct MediaService {
    pub store: Arc<dyn MediaStore>,
    pub storage: StorageRoot,
    pub notifier: Arc<dyn ProductNotifier>,
    gateway_base_url: String,
}

impl MediaService {
    pub fn new(
        store: Arc<dyn MediaStore>,
        storage: StorageRoot,
        notifier: Arc<dyn ProductNotifier>,
        gateway_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            notifier,
            gateway_base_url: gateway_base_url.into(),
        }
    }

    /// Validate and store an upload for `user_id`.
    ///
    /// Validation order: empty file, then size, then content type; the first
    /// failing check wins and nothing is written. The record is persisted in
    /// two phases because the public URL embeds the store-assigned id.
    pub async fn upload(&self, upload: MediaUpload, user_id: Uuid) -> MediaResult<Media> {
        if upload.data.is_empty() {
            return Err(MediaError::EmptyFile);
        }
        let size_bytes = upload.data.len() as i64;
        if size_bytes > MAX_FILE_SIZE {
            return Err(MediaError::FileTooLarge(size_bytes));
        }
        let content_type = match upload.content_type {
            Some(ct) if ct.starts_with("image/") => ct,
            other => return Err(MediaError::NotAnImage(other.unwrap_or_default())),
        };

        let name = StorageRoot::generate_name(&upload.original_filename);
        self.storage.write(&name, &upload.data).await?;

        let now = Utc::now();
        let mut media = match self
            .store
            .insert(NewMedia {
                original_filename: upload.original_filename,
                content_type,
                size_bytes,
                file_path: name.clone(),
                user_id,
                created_at: now,
                updated_at: now,
            })
            .await
        {
            Ok(media) => media,
            Err(err) => {
                self.rollback_file(&name).await;
                return Err(err.into());
            }
        };

        media.url = Some(format!(
            "{}/images/{}",
            self.gateway_base_url.trim_end_matches('/'),
            media.id
        ));
        if let Err(err) = self.store.update(&media).await {
            self.rollback_file(&name).await;
            if let Err(cleanup) = self.store.delete_many(&[media.id]).await {
                warn!(
                    "failed to roll back record {} after url update error: {}",
                    media.id, cleanup
                );
            }
            return Err(err.into());
        }

        debug!("stored media {} as {}", media.id, media.file_path);
        Ok(media)
    }

    /// Resolve the byte source for a media item.
    ///
    /// Pointer-only records hand back their external URL untouched; local
    /// records must open readably under the storage root.
    pub async fn get_resource(&self, id: Uuid) -> MediaResult<MediaResource> {
        let media = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(MediaError::MediaNotFound(id))?;

        if is_external_url(&media.file_path) {
            return Ok(MediaResource {
                source: MediaSource::External(media.file_path),
                content_type: media.content_type,
            });
        }

        let path = self.storage.resolve(&media.file_path)?;
        let file = File::open(&path)
            .await
            .map_err(|_| MediaError::FileMissing(id))?;
        Ok(MediaResource {
            source: MediaSource::Local(file),
            content_type: media.content_type,
        })
    }

    /// All media owned by `user_id`.
    pub async fn find_by_user(&self, user_id: Uuid) -> MediaResult<Vec<Media>> {
        Ok(self.store.find_by_user(user_id).await?)
    }

    /// Attach a media item to a catalog product. Only the owner may do this.
    pub async fn associate(
        &self,
        media_id: Uuid,
        product_id: Uuid,
        caller_id: Uuid,
    ) -> MediaResult<Media> {
        let mut media = self
            .store
            .find_by_id(media_id)
            .await?
            .ok_or(MediaError::MediaNotFound(media_id))?;
        if media.user_id != caller_id {
            return Err(MediaError::NotOwner(media_id));
        }

        media.product_id = Some(product_id);
        media.updated_at = Utc::now();
        self.store.update(&media).await?;
        Ok(media)
    }

    /// Authorized single-item delete.
    ///
    /// When the item is attached to a product, the product service is told
    /// first; its failure is logged and never blocks the local delete.
    pub async fn delete(&self, id: Uuid, caller_id: Uuid) -> MediaResult<()> {
        let media = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(MediaError::MediaNotFound(id))?;
        if media.user_id != caller_id {
            return Err(MediaError::NotOwner(id));
        }

        if let Some(product_id) = media.product_id {
            if let Err(err) = self.notifier.media_removed(product_id, media.id).await {
                warn!(
                    "product service was not notified that media {} left product {}: {}",
                    media.id, product_id, err
                );
            }
        }

        self.delete_batch(vec![media]).await
    }

    /// Remove every media item attached to `product_id`.
    pub async fn delete_by_product(&self, product_id: Uuid) -> MediaResult<()> {
        let matched = self.store.find_by_product(product_id).await?;
        self.delete_batch(matched).await
    }

    /// Remove every media item owned by `user_id`.
    pub async fn delete_by_user(&self, user_id: Uuid) -> MediaResult<()> {
        let matched = self.store.find_by_user(user_id).await?;
        self.delete_batch(matched).await
    }

    /// Remove the listed media items. An empty list is a no-op.
    pub async fn delete_by_ids(&self, ids: &[Uuid]) -> MediaResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let matched = self.store.find_by_ids(ids).await?;
        self.delete_batch(matched).await
    }

    /// Shared cascade tail: best-effort payload removal for each record,
    /// then one batch record delete. A failing physical delete never blocks
    /// the record delete or the rest of the batch.
    async fn delete_batch(&self, matched: Vec<Media>) -> MediaResult<()> {
        if matched.is_empty() {
            return Ok(());
        }
        for media in &matched {
            self.delete_physical(media).await;
        }
        let ids: Vec<Uuid> = matched.iter().map(|media| media.id).collect();
        let removed = self.store.delete_many(&ids).await?;
        debug!("deleted {} media record(s)", removed);
        Ok(())
    }

    /// Remove the payload of one record. External pointers are skipped, and
    /// failures are logged rather than propagated.
    async fn delete_physical(&self, media: &Media) {
        if is_external_url(&media.file_path) {
            return;
        }
        if let Err(err) = self.storage.delete_if_exists(&media.file_path).await {
            warn!(
                "failed to delete file {} for media {}: {}",
                media.file_path, media.id, err
            );
        }
    }

    async fn rollback_file(&self, name: &str) {
        if let Err(err) = self.storage.delete_if_exists(name).await {
            warn!("failed to roll back file {}: {}", name, err);
        }
    }
}

/// True for pointer-only media whose payload lives on another host.
fn is_external_url(file_path: &str) -> bool {
    file_path.starts_with("http://") || file_path.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        media_store::SqliteMediaStore,
        product_notifier::{NotifyError, ProductNotifier},
    };
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

    struct NoopNotifier;

    #[async_trait]
    impl ProductNotifier for NoopNotifier {
        async fn media_removed(&self, _: Uuid, _: Uuid) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl ProductNotifier for FailingNotifier {
        async fn media_removed(&self, _: Uuid, _: Uuid) -> Result<(), NotifyError> {
            Err(NotifyError::Status(StatusCode::BAD_GATEWAY))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(Uuid, Uuid)>>,
    }

    #[async_trait]
    impl ProductNotifier for RecordingNotifier {
        async fn media_removed(&self, product_id: Uuid, media_id: Uuid) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push((product_id, media_id));
            Ok(())
        }
    }

    async fn service_with(notifier: Arc<dyn ProductNotifier>) -> (MediaService, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&db).await.unwrap();
        }
        let storage = StorageRoot::new(dir.path());
        storage.ensure().unwrap();
        let service = MediaService::new(
            Arc::new(SqliteMediaStore::new(Arc::new(db))),
            storage,
            notifier,
            "https://gateway.test/api/media",
        );
        (service, dir)
    }

    async fn service() -> (MediaService, TempDir) {
        service_with(Arc::new(NoopNotifier)).await
    }

    fn png_upload(data: &[u8]) -> MediaUpload {
        MediaUpload {
            original_filename: "photo.png".into(),
            content_type: Some("image/png".into()),
            data: Bytes::copy_from_slice(data),
        }
    }

    fn stored_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    async fn insert_pointer_media(service: &MediaService, user_id: Uuid) -> Media {
        let now = Utc::now();
        service
            .store
            .insert(NewMedia {
                original_filename: "remote.png".into(),
                content_type: "image/png".into(),
                size_bytes: 512,
                file_path: "https://cdn.example.com/remote.png".into(),
                user_id,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_assigns_url_containing_the_id() {
        let (service, _dir) = service().await;
        let media = service.upload(png_upload(b"pngbytes"), Uuid::new_v4()).await.unwrap();

        let url = media.url.expect("url must be set after upload");
        assert!(url.contains(&media.id.to_string()));
        assert!(url.starts_with("https://gateway.test/api/media/images/"));

        let stored = service.store.find_by_id(media.id).await.unwrap().unwrap();
        assert_eq!(stored.url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn upload_writes_payload_under_the_root() {
        let (service, dir) = service().await;
        let media = service.upload(png_upload(b"pngbytes"), Uuid::new_v4()).await.unwrap();

        assert!(media.file_path.ends_with(".png"));
        let on_disk = std::fs::read(dir.path().join(&media.file_path)).unwrap();
        assert_eq!(on_disk, b"pngbytes");
    }

    #[tokio::test]
    async fn upload_rejects_empty_files() {
        let (service, dir) = service().await;
        let user_id = Uuid::new_v4();
        let err = service.upload(png_upload(b""), user_id).await.unwrap_err();

        assert!(matches!(err, MediaError::EmptyFile));
        assert_eq!(stored_files(&dir), 0);
        assert!(service.find_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_oversized_files() {
        let (service, dir) = service().await;
        let user_id = Uuid::new_v4();
        let oversized = vec![0u8; (MAX_FILE_SIZE + 1) as usize];
        let err = service.upload(png_upload(&oversized), user_id).await.unwrap_err();

        assert!(matches!(err, MediaError::FileTooLarge(_)));
        assert_eq!(stored_files(&dir), 0);
        assert!(service.find_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_non_image_content_types() {
        let (service, dir) = service().await;
        let mut upload = png_upload(b"definitely not an image");
        upload.content_type = Some("text/plain".into());
        let err = service.upload(upload, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MediaError::NotAnImage(_)));

        let mut upload = png_upload(b"no declared type");
        upload.content_type = None;
        let err = service.upload(upload, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MediaError::NotAnImage(_)));
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn upload_rejects_names_escaping_the_root() {
        let (service, dir) = service().await;
        let user_id = Uuid::new_v4();
        // The extension is everything from the last dot of the client name,
        // so a crafted name smuggles separators into the generated filename.
        let upload = MediaUpload {
            original_filename: "pwn./../../tmp/escape".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"payload"),
        };
        let err = service.upload(upload, user_id).await.unwrap_err();

        assert!(matches!(
            err,
            MediaError::Storage(StorageRootError::UnsafeName(_))
        ));
        assert_eq!(stored_files(&dir), 0);
        assert!(service.find_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_resource_streams_local_files() {
        let (service, _dir) = service().await;
        let media = service.upload(png_upload(b"pngbytes"), Uuid::new_v4()).await.unwrap();

        let resource = service.get_resource(media.id).await.unwrap();
        assert_eq!(resource.content_type, "image/png");
        match resource.source {
            MediaSource::Local(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents).await.unwrap();
                assert_eq!(contents, b"pngbytes");
            }
            MediaSource::External(_) => panic!("expected a local source"),
        }
    }

    #[tokio::test]
    async fn get_resource_passes_external_urls_through() {
        let (service, _dir) = service().await;
        let media = insert_pointer_media(&service, Uuid::new_v4()).await;

        let resource = service.get_resource(media.id).await.unwrap();
        match resource.source {
            MediaSource::External(url) => {
                assert_eq!(url, "https://cdn.example.com/remote.png");
            }
            MediaSource::Local(_) => panic!("expected an external source"),
        }
    }

    #[tokio::test]
    async fn get_resource_reports_missing_records_and_files() {
        let (service, dir) = service().await;
        let err = service.get_resource(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MediaError::MediaNotFound(_)));

        let media = service.upload(png_upload(b"pngbytes"), Uuid::new_v4()).await.unwrap();
        std::fs::remove_file(dir.path().join(&media.file_path)).unwrap();
        let err = service.get_resource(media.id).await.unwrap_err();
        assert!(matches!(err, MediaError::FileMissing(_)));
    }

    #[tokio::test]
    async fn associate_sets_product_and_refreshes_updated_at() {
        let (service, _dir) = service().await;
        let owner = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();

        let updated = service.associate(media.id, product_id, owner).await.unwrap();
        assert_eq!(updated.product_id, Some(product_id));
        assert!(updated.updated_at >= media.updated_at);

        let stored = service.store.find_by_id(media.id).await.unwrap().unwrap();
        assert_eq!(stored.product_id, Some(product_id));
        assert_eq!(stored.user_id, owner);
    }

    #[tokio::test]
    async fn associate_requires_ownership() {
        let (service, _dir) = service().await;
        let owner = Uuid::new_v4();
        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();

        let err = service
            .associate(media.id, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotOwner(_)));

        let stored = service.store.find_by_id(media.id).await.unwrap().unwrap();
        assert_eq!(stored.product_id, None);
    }

    #[tokio::test]
    async fn delete_removes_file_and_record() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();

        service.delete(media.id, owner).await.unwrap();
        assert_eq!(stored_files(&dir), 0);
        assert!(service.store.find_by_id(media.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();

        let err = service.delete(media.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MediaError::NotOwner(_)));
        assert_eq!(stored_files(&dir), 1);
        assert!(service.store.find_by_id(media.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_notifies_the_product_service_for_associated_media() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _dir) = service_with(notifier.clone()).await;
        let owner = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();
        service.associate(media.id, product_id, owner).await.unwrap();
        service.delete(media.id, owner).await.unwrap();

        assert_eq!(*notifier.calls.lock().unwrap(), vec![(product_id, media.id)]);
    }

    #[tokio::test]
    async fn delete_does_not_notify_for_unassociated_media() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _dir) = service_with(notifier.clone()).await;
        let owner = Uuid::new_v4();

        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();
        service.delete(media.id, owner).await.unwrap();

        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_survives_notifier_failure() {
        let (service, dir) = service_with(Arc::new(FailingNotifier)).await;
        let owner = Uuid::new_v4();
        let media = service.upload(png_upload(b"pngbytes"), owner).await.unwrap();
        service.associate(media.id, Uuid::new_v4(), owner).await.unwrap();

        service.delete(media.id, owner).await.unwrap();
        assert_eq!(stored_files(&dir), 0);
        assert!(service.store.find_by_id(media.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_skips_filesystem_for_external_media() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let media = insert_pointer_media(&service, owner).await;

        service.delete(media.id, owner).await.unwrap();
        assert!(service.store.find_by_id(media.id).await.unwrap().is_none());
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn delete_by_product_tolerates_physical_delete_failure() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        let first = service.upload(png_upload(b"first"), owner).await.unwrap();
        let second = service.upload(png_upload(b"second"), owner).await.unwrap();
        service.associate(first.id, product_id, owner).await.unwrap();
        service.associate(second.id, product_id, owner).await.unwrap();

        // Turn the first payload into a non-empty directory so its
        // remove_file fails with something other than NotFound.
        let blocked = dir.path().join(&first.file_path);
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("pin"), b"x").unwrap();

        service.delete_by_product(product_id).await.unwrap();
        assert!(service.store.find_by_id(first.id).await.unwrap().is_none());
        assert!(service.store.find_by_id(second.id).await.unwrap().is_none());
        assert!(!dir.path().join(&second.file_path).exists());
    }

    #[tokio::test]
    async fn delete_by_ids_ignores_empty_and_unknown_input() {
        let (service, _dir) = service().await;
        service.delete_by_ids(&[]).await.unwrap();
        service.delete_by_ids(&[Uuid::new_v4()]).await.unwrap();
    }

    #[tokio::test]
    async fn delete_by_ids_removes_listed_records() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let first = service.upload(png_upload(b"first"), owner).await.unwrap();
        let second = service.upload(png_upload(b"second"), owner).await.unwrap();
        let kept = service.upload(png_upload(b"kept"), owner).await.unwrap();

        service.delete_by_ids(&[first.id, second.id]).await.unwrap();
        assert!(service.store.find_by_id(first.id).await.unwrap().is_none());
        assert!(service.store.find_by_id(second.id).await.unwrap().is_none());
        assert!(service.store.find_by_id(kept.id).await.unwrap().is_some());
        assert_eq!(stored_files(&dir), 1);
    }

    #[tokio::test]
    async fn delete_by_user_removes_local_and_pointer_media() {
        let (service, dir) = service().await;
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        service.upload(png_upload(b"mine"), owner).await.unwrap();
        insert_pointer_media(&service, owner).await;
        let kept = service.upload(png_upload(b"theirs"), other).await.unwrap();

        service.delete_by_user(owner).await.unwrap();
        assert!(service.find_by_user(owner).await.unwrap().is_empty());
        assert!(service.store.find_by_id(kept.id).await.unwrap().is_some());
        assert_eq!(stored_files(&dir), 1);
    }
}
