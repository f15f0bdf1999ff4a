use std::io::Cursor;

use image::DynamicImage;

/// Single raster operation. Rotations are clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    FlipHorizontal,
    FlipVertical,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Transform {
    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Transform::FlipHorizontal => img.fliph(),
            Transform::FlipVertical => img.flipv(),
            Transform::Rotate90 => img.rotate90(),
            Transform::Rotate180 => img.rotate180(),
            Transform::Rotate270 => img.rotate270(),
        }
    }
}

/// EXIF orientation tag values 1-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Orientation::Normal),
            2 => Some(Orientation::FlipHorizontal),
            3 => Some(Orientation::Rotate180),
            4 => Some(Orientation::FlipVertical),
            5 => Some(Orientation::Transpose),
            6 => Some(Orientation::Rotate90),
            7 => Some(Orientation::Transverse),
            8 => Some(Orientation::Rotate270),
            _ => None,
        }
    }

    /// Operations that bring a stored raster upright, applied in order.
    pub fn transforms(self) -> &'static [Transform] {
        match self {
            Orientation::Normal => &[],
            Orientation::FlipHorizontal => &[Transform::FlipHorizontal],
            Orientation::Rotate180 => &[Transform::Rotate180],
            Orientation::FlipVertical => &[Transform::FlipVertical],
            Orientation::Transpose => &[Transform::Rotate90, Transform::FlipHorizontal],
            Orientation::Rotate90 => &[Transform::Rotate90],
            Orientation::Transverse => &[Transform::Rotate270, Transform::FlipHorizontal],
            Orientation::Rotate270 => &[Transform::Rotate270],
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        self.transforms()
            .iter()
            .fold(img, |img, transform| transform.apply(img))
    }
}

/// Reads the primary image's orientation tag from any container the EXIF
/// reader understands (JPEG, HEIF, PNG, WebP). Missing or malformed EXIF
/// yields `None`, which callers treat as upright.
pub fn read_exif_orientation(data: &[u8]) -> Option<Orientation> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    Orientation::from_exif(value)
}
