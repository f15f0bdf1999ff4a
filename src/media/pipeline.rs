use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};

use super::format::ImageFormat;
use super::{MediaError, UploadedImage};

pub const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;
pub const PREVIEW_WIDTH: u32 = 300;
pub const FULL_QUALITY: u8 = 85;
pub const PREVIEW_QUALITY: u8 = 70;

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// The derived asset pair for one upload.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub source_format: ImageFormat,
    pub full: EncodedImage,
    pub preview: EncodedImage,
}

/// Target size for a width-capped downscale. Images at or under the cap
/// keep their dimensions.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }

    let scaled = (u64::from(height) * u64::from(max_width) + u64::from(width) / 2)
        / u64::from(width);
    (max_width, scaled.max(1) as u32)
}

pub fn process_image(upload: &UploadedImage, max_width: u32) -> Result<ProcessedImage, MediaError> {
    if upload.data.is_empty() {
        return Err(MediaError::Empty);
    }

    if upload.data.len() > MAX_UPLOAD_SIZE {
        return Err(MediaError::TooLarge {
            size: upload.data.len(),
            limit: MAX_UPLOAD_SIZE,
        });
    }

    let format = ImageFormat::sniff(&upload.data);

    if let Some(declared) = upload.content_type.as_deref() {
        if declared != format.mime() {
            tracing::debug!(
                "Declared content type differs from detected: file={}, declared={}, detected={}",
                upload.file_name,
                declared,
                format
            );
        }
    }

    let img = decode(format, &upload.data)?;

    let full = downscale(img, max_width);
    let preview = downscale(full.clone(), PREVIEW_WIDTH);

    Ok(ProcessedImage {
        source_format: format,
        full: encode_jpeg(&full, FULL_QUALITY)?,
        preview: encode_jpeg(&preview, PREVIEW_QUALITY)?,
    })
}

pub fn decode(format: ImageFormat, data: &[u8]) -> Result<DynamicImage, MediaError> {
    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Webp => {
            let raster = format
                .raster_format()
                .ok_or(MediaError::UnsupportedFormat)?;
            decode_raster(data, raster)
        }
        ImageFormat::Heic => super::heic::decode(data),
        ImageFormat::Unsupported => Err(MediaError::UnsupportedFormat),
    }
}

// The decoder reports the EXIF orientation it found; it is applied here so
// the raster leaves this function upright.
fn decode_raster(data: &[u8], format: image::ImageFormat) -> Result<DynamicImage, MediaError> {
    let mut decoder = ImageReader::with_format(Cursor::new(data), format)
        .into_decoder()
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let orientation = decoder
        .orientation()
        .unwrap_or(image::metadata::Orientation::NoTransforms);

    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| MediaError::Decode(e.to_string()))?;
    img.apply_orientation(orientation);

    Ok(img)
}

fn downscale(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = scaled_dimensions(img.width(), img.height(), max_width);
    if width == img.width() {
        return img;
    }

    img.resize_exact(width, height, FilterType::Lanczos3)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedImage, MediaError> {
    let rgb = img.to_rgb8();
    let mut bytes = Vec::new();

    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| MediaError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        bytes,
        mime: mime::IMAGE_JPEG.to_string(),
        width: rgb.width(),
        height: rgb.height(),
    })
}
