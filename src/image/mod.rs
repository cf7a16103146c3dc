//! Image normalization
//!
//! Decodes an uploaded image, corrects its orientation, bounds its size and
//! re-encodes it to the configured web format. No network or storage
//! knowledge lives here.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::error::TransformError;
use crate::models::TransformedImage;
use async_trait::async_trait;

#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(&self, image_data: &[u8]) -> Result<TransformedImage, TransformError>;
}
