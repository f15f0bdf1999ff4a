use image::DynamicImage;

use super::MediaError;

/// HEIC goes through libheif with its own transformations switched off; the
/// EXIF orientation is applied from our table instead.
#[cfg(feature = "heic")]
pub fn decode(data: &[u8]) -> Result<DynamicImage, MediaError> {
    use libheif_rs::{ColorSpace, DecodingOptions, HeifContext, LibHeif, RgbChroma};

    use super::orientation::read_exif_orientation;

    let lib = LibHeif::new();
    let context =
        HeifContext::read_from_bytes(data).map_err(|e| MediaError::Decode(e.to_string()))?;
    let handle = context
        .primary_image_handle()
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let mut options = DecodingOptions::new()
        .ok_or_else(|| MediaError::Decode("failed to allocate heif decoding options".to_string()))?;
    options.set_ignore_transformations(true);

    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), Some(options))
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| MediaError::Decode("heif image has no interleaved plane".to_string()))?;

    let row_len = plane.width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    let raster = image::RgbImage::from_raw(plane.width, plane.height, pixels)
        .ok_or_else(|| MediaError::Decode("heif plane size mismatch".to_string()))?;
    let img = DynamicImage::ImageRgb8(raster);

    Ok(match read_exif_orientation(data) {
        Some(orientation) => orientation.apply(img),
        None => img,
    })
}

#[cfg(not(feature = "heic"))]
pub fn decode(_data: &[u8]) -> Result<DynamicImage, MediaError> {
    Err(MediaError::HeicUnavailable)
}

#[cfg(all(test, feature = "heic"))]
mod tests {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    use super::*;

    /// Big-endian TIFF block with a single orientation entry.
    fn exif_orientation_block(orientation: u16) -> Vec<u8> {
        let mut tiff = b"MM\0\x2a\0\0\0\x08".to_vec();
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());
        tiff
    }

    fn heic_bytes(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let lib = LibHeif::new();
        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image
            .create_plane(Channel::Interleaved, width, height, 8)
            .unwrap();

        let planes = image.planes_mut();
        let plane = planes.interleaved.unwrap();
        for row in plane.data.chunks_mut(plane.stride).take(height as usize) {
            for pixel in row[..width as usize * 3].chunks_mut(3) {
                pixel.copy_from_slice(&[200, 80, 20]);
            }
        }

        let mut context = HeifContext::new().unwrap();
        let mut encoder = lib.encoder_for_format(CompressionFormat::Hevc).unwrap();
        encoder.set_quality(EncoderQuality::Lossy(80)).unwrap();
        let handle = context.encode_image(&image, &mut encoder, None).unwrap();
        context
            .add_exif_metadata(&handle, &exif_orientation_block(orientation))
            .unwrap();
        context.write_to_bytes().unwrap()
    }

    #[test]
    fn test_heic_is_decoded_upright() {
        let data = heic_bytes(64, 32, 6);
        assert_eq!(
            crate::media::ImageFormat::sniff(&data),
            crate::media::ImageFormat::Heic
        );

        let img = decode(&data).unwrap();
        assert_eq!((img.width(), img.height()), (32, 64));
    }

    #[test]
    fn test_heic_without_rotation_keeps_dimensions() {
        let img = decode(&heic_bytes(64, 32, 1)).unwrap();
        assert_eq!((img.width(), img.height()), (64, 32));
    }
}
