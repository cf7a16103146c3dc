use super::ImageTransformer;
use crate::error::TransformError;
use crate::models::{MediaPolicy, TargetFormat, TransformedImage};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

pub struct ImageProcessor {
    policy: MediaPolicy,
}

impl ImageProcessor {
    pub fn new(policy: MediaPolicy) -> Self {
        Self { policy }
    }

    fn decode_upright(image_data: &[u8]) -> Result<DynamicImage, TransformError> {
        let mut decoder = ImageReader::new(Cursor::new(image_data))
            .with_guessed_format()
            .map_err(|e| TransformError::Failed(format!("Failed to sniff image format: {}", e)))?
            .into_decoder()?;

        // Missing or unreadable EXIF just means "already upright".
        let orientation = decoder.orientation().unwrap_or_else(|e| {
            tracing::debug!("Could not read orientation metadata: {}", e);
            image::metadata::Orientation::NoTransforms
        });

        let mut image = DynamicImage::from_decoder(decoder)?;
        image.apply_orientation(orientation);
        Ok(image)
    }

    fn bound_dimensions(image: DynamicImage, max_dimension: u32) -> DynamicImage {
        if image.width().max(image.height()) <= max_dimension {
            return image;
        }
        image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }

    fn encode(image: &DynamicImage, policy: &MediaPolicy) -> Result<Vec<u8>, TransformError> {
        match policy.target_format {
            TargetFormat::WebP => {
                let rgba = image.to_rgba8();
                let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
                let encoded = encoder
                    .encode_simple(false, f32::from(policy.quality))
                    .map_err(|e| TransformError::Failed(format!("WebP encode failed: {:?}", e)))?;
                Ok(encoded.to_vec())
            }
            TargetFormat::Jpeg => {
                let mut out = Vec::new();
                let encoder = JpegEncoder::new_with_quality(&mut out, policy.quality);
                // JPEG has no alpha channel.
                DynamicImage::ImageRgb8(image.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| TransformError::Failed(format!("JPEG encode failed: {}", e)))?;
                Ok(out)
            }
        }
    }

    fn transform_sync(
        image_data: &[u8],
        policy: MediaPolicy,
    ) -> Result<TransformedImage, TransformError> {
        let image = Self::decode_upright(image_data)?;
        let image = Self::bound_dimensions(image, policy.max_dimension);
        let data = Self::encode(&image, &policy)?;

        if data.is_empty() {
            return Err(TransformError::Failed("Encoder produced no output".to_string()));
        }

        Ok(TransformedImage {
            data,
            extension: policy.target_format.extension(),
            width: image.width(),
            height: image.height(),
        })
    }
}

#[async_trait]
impl ImageTransformer for ImageProcessor {
    async fn transform(&self, image_data: &[u8]) -> Result<TransformedImage, TransformError> {
        let policy = self.policy;
        let owned = image_data.to_vec();

        tokio::task::spawn_blocking(move || Self::transform_sync(&owned, policy))
            .await
            .map_err(|e| TransformError::Failed(format!("Image transform task join error: {}", e)))?
    }
}
