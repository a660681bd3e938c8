use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;

/// One uploaded image, as parsed out of a multipart field.
pub struct ImageUpload {
    pub original_name: String,
    pub content_type: String,
    pub body: Bytes,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.body.len())
            .finish()
    }
}

/// Parsed multipart form shared by create and update. Every field is
/// optional here; the service decides what is required per operation.
#[derive(Debug, Default)]
pub struct CategoryForm {
    pub name: Option<String>,
    pub item_count: Option<i64>,
    pub image: Option<ImageUpload>,
}

/// Category row with the image projected to its retrievable path.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub item_count: i64,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
