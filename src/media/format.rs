use std::fmt;

/// How many leading bytes are inspected when classifying an upload.
pub const SNIFF_LEN: usize = 512;

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// Upload content type as detected from the bytes themselves. The declared
/// content type and the file extension are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Heic,
    Unsupported,
}

impl ImageFormat {
    pub fn sniff(data: &[u8]) -> Self {
        let head = &data[..data.len().min(SNIFF_LEN)];

        match head {
            [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => ImageFormat::Png,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormat::Webp,
            [_, _, _, _, b'f', b't', b'y', b'p', b0, b1, b2, b3, ..]
                if HEIF_BRANDS.contains(&&[*b0, *b1, *b2, *b3]) =>
            {
                ImageFormat::Heic
            }
            _ => ImageFormat::Unsupported,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Heic => "image/heic",
            ImageFormat::Unsupported => "application/octet-stream",
        }
    }

    /// Decoder for formats handled by the `image` crate.
    pub(crate) fn raster_format(&self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::Webp => Some(image::ImageFormat::WebP),
            ImageFormat::Heic | ImageFormat::Unsupported => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
