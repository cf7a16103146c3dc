use super::ImageTransformer;
use crate::error::TransformError;
use crate::models::TransformedImage;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Transformer double that returns canned bytes or a canned failure.
#[derive(Clone)]
pub struct MockImageProcessor {
    transform_count: Arc<Mutex<usize>>,
    output: Vec<u8>,
    extension: &'static str,
    should_fail: Arc<Mutex<bool>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            transform_count: Arc::new(Mutex::new(0)),
            output: b"mock-webp-bytes".to_vec(),
            extension: "webp",
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_output(mut self, output: Vec<u8>, extension: &'static str) -> Self {
        self.output = output;
        self.extension = extension;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_transform_count(&self) -> usize {
        *self.transform_count.lock().unwrap()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageTransformer for MockImageProcessor {
    async fn transform(&self, _image_data: &[u8]) -> Result<TransformedImage, TransformError> {
        *self.transform_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(TransformError::Failed("Mock failure".to_string()));
        }

        Ok(TransformedImage {
            data: self.output.clone(),
            extension: self.extension,
            width: 1,
            height: 1,
        })
    }
}
