//! Ingestion orchestration: validate, transform or fall back, name, store.

use crate::image::mime::{extension_from_filename, is_image_content_type};
use crate::image::{ImageProcessor, ImageTransformer};
use crate::models::{Config, StoredObject, TransformResult, UploadRequest};
use crate::naming::StorageKey;
use crate::storage::{FtpStore, MockRemoteStore, RemoteStore};
use crate::{Error, Result};
use std::time::Duration;
use tracing::{error, info, warn};

/// Uploads held by the in-memory store in `DRY_RUN` mode.
const DRY_RUN_RETAINED_UPLOADS: usize = 32;

/// Turns one uploaded image into a publicly addressable object.
///
/// Holds no per-upload state, so a single instance serves concurrent uploads.
pub struct Pipeline {
    transformer: Box<dyn ImageTransformer>,
    store: Box<dyn RemoteStore>,
    public_base_url: String,
    upload_timeout: Duration,
}

/// Injectable service bundle used to construct [`Pipeline`] in tests/harnesses.
pub struct PipelineServices {
    pub transformer: Box<dyn ImageTransformer>,
    pub store: Box<dyn RemoteStore>,
}

impl Pipeline {
    /// Build a pipeline from concrete service dependencies.
    pub fn with_services(
        services: PipelineServices,
        public_base_url: String,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            transformer: services.transformer,
            store: services.store,
            public_base_url,
            upload_timeout,
        }
    }

    /// Construct the production pipeline from configuration.
    pub fn new(config: &Config) -> Self {
        let store: Box<dyn RemoteStore> = if config.dry_run {
            info!(
                "DRY_RUN enabled, only the last {} uploads are kept in memory",
                DRY_RUN_RETAINED_UPLOADS
            );
            Box::new(MockRemoteStore::new().with_retention(DRY_RUN_RETAINED_UPLOADS))
        } else {
            info!(
                "Remote store: ftp://{}:{}{}",
                config.ftp.host, config.ftp.port, config.ftp.upload_dir
            );
            Box::new(FtpStore::new(config.ftp.clone()))
        };

        info!(
            "Media policy: max {}px, quality {}, target .{}",
            config.media.max_dimension,
            config.media.quality,
            config.media.target_format.extension()
        );

        Self::with_services(
            PipelineServices {
                transformer: Box::new(ImageProcessor::new(config.media)),
                store,
            },
            config.public_base_url.clone(),
            config.upload_timeout,
        )
    }

    /// Run one upload through the pipeline.
    ///
    /// Only a non-image content type or a remote-store failure can fail the
    /// call; a failed transform falls back to the original bytes.
    pub async fn ingest(&self, request: UploadRequest) -> Result<StoredObject> {
        if !is_image_content_type(&request.content_type) {
            info!(
                "Rejecting upload {:?} with content type {:?}",
                request.filename, request.content_type
            );
            return Err(Error::UnsupportedMediaType(request.content_type));
        }

        info!(
            "Ingesting {:?} ({}, {} bytes)",
            request.filename,
            request.content_type,
            request.data.len()
        );

        let prepared = self.prepare(request).await;
        let key = StorageKey::allocate(prepared.extension());

        info!(
            "Storing {} ({} bytes, fallback: {})",
            key,
            prepared.data().len(),
            prepared.is_fallback()
        );

        if let Err(e) = self
            .store
            .store(&key, prepared.data(), self.upload_timeout)
            .await
        {
            error!("Upload of {} failed: {}", key, e);
            return Err(e.into());
        }

        let url = format!("{}{}", self.public_base_url, key);
        info!("Upload successful: {}", url);

        Ok(StoredObject {
            url,
            storage_key: key.into_string(),
        })
    }

    async fn prepare(&self, request: UploadRequest) -> TransformResult {
        match self.transformer.transform(&request.data).await {
            Ok(transformed) => {
                info!(
                    "Normalized {:?} to {}x{} .{} ({} -> {} bytes)",
                    request.filename,
                    transformed.width,
                    transformed.height,
                    transformed.extension,
                    request.data.len(),
                    transformed.data.len()
                );
                TransformResult::Transformed {
                    data: transformed.data,
                    extension: transformed.extension.to_string(),
                }
            }
            Err(e) => {
                warn!(
                    "Image optimization failed for {:?}, storing original: {}",
                    request.filename, e
                );
                TransformResult::Fallback {
                    extension: extension_from_filename(&request.filename),
                    data: request.data,
                }
            }
        }
    }
}
