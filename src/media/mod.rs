//! Upload normalization: sniff the real format, decode, bring the raster
//! upright, then derive the full-size and preview JPEGs.

mod format;
mod heic;
mod orientation;
mod pipeline;

pub use format::ImageFormat;
pub use orientation::{Orientation, Transform, read_exif_orientation};
pub use pipeline::{
    EncodedImage, FULL_QUALITY, MAX_UPLOAD_SIZE, PREVIEW_QUALITY, PREVIEW_WIDTH, ProcessedImage,
    decode, encode_jpeg, process_image, scaled_dimensions,
};

use thiserror::Error;

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("uploaded file is too large: {size} bytes (max {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported image type; JPEG, PNG, WEBP and HEIC are accepted")]
    UnsupportedFormat,

    #[error("HEIC images are not supported by this server build")]
    HeicUnavailable,

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}
