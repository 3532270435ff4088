use async_trait::async_trait;

use crate::models::{Coordinate, PhotoDescriptor};

use super::ApiError;

/// Source of photo listings for a coordinate, one page at a time.
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Fetch page `page` (1-based) of photos near `coordinate`.
    async fn fetch_index(
        &self,
        coordinate: Coordinate,
        page: u32,
    ) -> Result<Vec<PhotoDescriptor>, ApiError>;
}

/// Source of raw image bytes for a listed photo. Implementations do not retry.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, photo: &PhotoDescriptor) -> Result<Vec<u8>, ApiError>;
}
