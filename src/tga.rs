// ============================================================================
// TGA IMAGE — loader for the uncompressed, direct-colour TGA subset
// ============================================================================
//
// Only image type 2 (uncompressed true-colour) at 24 or 32 bits per pixel is
// accepted.  Colour-mapped, paletted and RLE-compressed files are rejected.
// Pixel data is always handed out as BGRA8, top row first, whatever origin
// the file declares.

use std::fmt;
use std::path::Path;

/// Size of the fixed TGA header in bytes.
pub const HEADER_LEN: usize = 18;

/// Descriptor bit: pixel rows are stored top to bottom.
const DESC_TOP_ORIGIN: u8 = 0x20;
/// Descriptor bit: pixels within a row are stored right to left.
const DESC_RIGHT_ORIGIN: u8 = 0x10;

const TYPE_PALETTED: u8 = 1;
const TYPE_TRUE_COLOR: u8 = 2;
const TYPE_PALETTED_RLE: u8 = 9;
const TYPE_TRUE_COLOR_RLE: u8 = 10;
const TYPE_GRAYSCALE_RLE: u8 = 11;

// ============================================================================
// HEADER
// ============================================================================

/// The 18-byte little-endian TGA file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub color_map_first: u16,
    pub color_map_length: u16,
    pub color_map_depth: u8,
    pub x_origin: u16,
    pub y_origin: u16,
    pub width: u16,
    pub height: u16,
    pub pixel_depth: u8,
    pub descriptor: u8,
}

impl TgaHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, TgaError> {
        if bytes.len() < HEADER_LEN {
            return Err(TgaError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Ok(Self {
            id_length: bytes[0],
            color_map_type: bytes[1],
            image_type: bytes[2],
            color_map_first: u16_at(3),
            color_map_length: u16_at(5),
            color_map_depth: bytes[7],
            x_origin: u16_at(8),
            y_origin: u16_at(10),
            width: u16_at(12),
            height: u16_at(14),
            pixel_depth: bytes[16],
            descriptor: bytes[17],
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.id_length;
        out[1] = self.color_map_type;
        out[2] = self.image_type;
        out[3..5].copy_from_slice(&self.color_map_first.to_le_bytes());
        out[5..7].copy_from_slice(&self.color_map_length.to_le_bytes());
        out[7] = self.color_map_depth;
        out[8..10].copy_from_slice(&self.x_origin.to_le_bytes());
        out[10..12].copy_from_slice(&self.y_origin.to_le_bytes());
        out[12..14].copy_from_slice(&self.width.to_le_bytes());
        out[14..16].copy_from_slice(&self.height.to_le_bytes());
        out[16] = self.pixel_depth;
        out[17] = self.descriptor;
        out
    }

    pub fn top_origin(&self) -> bool {
        self.descriptor & DESC_TOP_ORIGIN != 0
    }

    pub fn right_origin(&self) -> bool {
        self.descriptor & DESC_RIGHT_ORIGIN != 0
    }

    /// Check that this header describes a file we can decode.
    fn validate(&self) -> Result<(), TgaError> {
        if self.color_map_type != 0 {
            return Err(TgaError::ColorMapped);
        }
        match self.image_type {
            TYPE_TRUE_COLOR => {}
            TYPE_PALETTED | TYPE_PALETTED_RLE => return Err(TgaError::Paletted),
            TYPE_TRUE_COLOR_RLE | TYPE_GRAYSCALE_RLE => return Err(TgaError::Compressed),
            other => return Err(TgaError::UnsupportedImageType(other)),
        }
        if self.pixel_depth != 24 && self.pixel_depth != 32 {
            return Err(TgaError::UnsupportedPixelDepth(self.pixel_depth));
        }
        if self.width == 0 || self.height == 0 {
            return Err(TgaError::EmptyImage);
        }
        Ok(())
    }
}

// ============================================================================
// IMAGE
// ============================================================================

/// A decoded TGA image: width, height and BGRA8 pixels, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TgaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TgaImage {
    /// Load a TGA file, yielding `None` if it is missing, unreadable or not
    /// the supported variant.  The reason is written to the session log.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(img) => Some(img),
            Err(e) => {
                crate::log_warn!("TGA load failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load a TGA file, reporting why it was rejected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TgaError> {
        let bytes = std::fs::read(path.as_ref()).map_err(TgaError::Io)?;
        Self::from_bytes(&bytes)
    }

    /// Decode an in-memory TGA file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TgaError> {
        let header = TgaHeader::parse(bytes)?;
        header.validate()?;

        let width = header.width as usize;
        let height = header.height as usize;
        let src_bpp = header.pixel_depth as usize / 8;
        let start = HEADER_LEN + header.id_length as usize;
        let expected = start + width * height * src_bpp;
        if bytes.len() < expected {
            return Err(TgaError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels = &bytes[start..expected];

        let mut data = vec![0u8; width * height * 4];
        for src_row in 0..height {
            let dst_row = if header.top_origin() { src_row } else { height - 1 - src_row };
            let src = &pixels[src_row * width * src_bpp..(src_row + 1) * width * src_bpp];
            let dst = &mut data[dst_row * width * 4..(dst_row + 1) * width * 4];
            for (x, px) in src.chunks_exact(src_bpp).enumerate() {
                let dst_x = if header.right_origin() { width - 1 - x } else { x };
                let out = &mut dst[dst_x * 4..dst_x * 4 + 4];
                out[..3].copy_from_slice(&px[..3]);
                out[3] = if src_bpp == 4 { px[3] } else { 255 };
            }
        }

        Ok(Self {
            width: header.width as u32,
            height: header.height as u32,
            data,
        })
    }

    /// Wrap existing BGRA8 pixels (top row first).
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Result<Self, TgaError> {
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(TgaError::EmptyImage);
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TgaError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// BGRA8 pixel bytes, `width * height * 4` long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the pixels with red and blue swapped, for RGBA encoders.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = self.data.clone();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        rgba
    }

    /// Encode as an uncompressed 32-bit, top-left-origin TGA file.
    pub fn to_tga_bytes(&self) -> Vec<u8> {
        let header = TgaHeader {
            id_length: 0,
            color_map_type: 0,
            image_type: TYPE_TRUE_COLOR,
            color_map_first: 0,
            color_map_length: 0,
            color_map_depth: 0,
            x_origin: 0,
            y_origin: 0,
            width: self.width as u16,
            height: self.height as u16,
            pixel_depth: 32,
            // 8 attribute (alpha) bits, top origin
            descriptor: DESC_TOP_ORIGIN | 0x08,
        };
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TgaError> {
        std::fs::write(path.as_ref(), self.to_tga_bytes()).map_err(TgaError::Io)
    }
}

impl crate::gpu::ImageSource for TgaImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bgra(&self) -> &[u8] {
        &self.data
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Why a TGA file was rejected.
#[derive(Debug)]
pub enum TgaError {
    Io(std::io::Error),
    /// File ends before the header or pixel data does.
    Truncated { expected: usize, actual: usize },
    /// The header declares a colour map.
    ColorMapped,
    /// Palette-indexed image type (1 or 9).
    Paletted,
    /// RLE-compressed image type (10 or 11).
    Compressed,
    UnsupportedImageType(u8),
    UnsupportedPixelDepth(u8),
    /// Zero width or height.
    EmptyImage,
    /// Pixel buffer does not match `width * height * 4`.
    DataLength { expected: usize, actual: usize },
}

impl fmt::Display for TgaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TgaError::Io(e) => write!(f, "I/O error: {e}"),
            TgaError::Truncated { expected, actual } => {
                write!(f, "file truncated: need {expected} bytes, have {actual}")
            }
            TgaError::ColorMapped => write!(f, "color-mapped TGA files are not supported"),
            TgaError::Paletted => write!(f, "palette-indexed TGA files are not supported"),
            TgaError::Compressed => write!(f, "RLE-compressed TGA files are not supported"),
            TgaError::UnsupportedImageType(t) => write!(f, "unsupported TGA image type {t}"),
            TgaError::UnsupportedPixelDepth(d) => {
                write!(f, "unsupported pixel depth {d} (expected 24 or 32)")
            }
            TgaError::EmptyImage => write!(f, "image has zero or out-of-range dimensions"),
            TgaError::DataLength { expected, actual } => {
                write!(f, "pixel buffer is {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for TgaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TgaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn header(image_type: u8, depth: u8, w: u16, h: u16, descriptor: u8) -> TgaHeader {
        TgaHeader {
            id_length: 0,
            color_map_type: 0,
            image_type,
            color_map_first: 0,
            color_map_length: 0,
            color_map_depth: 0,
            x_origin: 0,
            y_origin: 0,
            width: w,
            height: h,
            pixel_depth: depth,
            descriptor,
        }
    }

    fn file(h: TgaHeader, pixels: &[u8]) -> Vec<u8> {
        let mut out = h.to_bytes().to_vec();
        out.extend_from_slice(pixels);
        out
    }

    #[test]
    fn header_fields_are_little_endian() {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[2] = 2;
        bytes[12] = 0x34;
        bytes[13] = 0x12;
        bytes[14] = 0x02;
        bytes[16] = 32;
        let h = TgaHeader::parse(&bytes).unwrap();
        assert_eq!(h.width, 0x1234);
        assert_eq!(h.height, 2);
        assert_eq!(h.pixel_depth, 32);
    }

    #[test]
    fn short_header_is_truncated() {
        let err = TgaHeader::parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, TgaError::Truncated { expected: 18, actual: 10 }));
    }

    #[test]
    fn bottom_origin_24bit_is_flipped_and_opaque() {
        // 1x2 image stored bottom row first: bottom = (1,2,3), top = (4,5,6)
        let bytes = file(header(2, 24, 1, 2, 0), &[1, 2, 3, 4, 5, 6]);
        let img = TgaImage::from_bytes(&bytes).unwrap();
        assert_eq!(img.data(), &[4, 5, 6, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn top_origin_32bit_is_copied() {
        let px = [10, 20, 30, 40, 50, 60, 70, 80];
        let bytes = file(header(2, 32, 2, 1, DESC_TOP_ORIGIN | 8), &px);
        let img = TgaImage::from_bytes(&bytes).unwrap();
        assert_eq!(img.data(), &px);
    }

    #[test]
    fn right_origin_mirrors_rows() {
        let px = [1, 1, 1, 1, 2, 2, 2, 2];
        let bytes = file(header(2, 32, 2, 1, DESC_TOP_ORIGIN | DESC_RIGHT_ORIGIN), &px);
        let img = TgaImage::from_bytes(&bytes).unwrap();
        assert_eq!(img.data(), &[2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn image_id_field_is_skipped() {
        let mut h = header(2, 24, 1, 1, DESC_TOP_ORIGIN);
        h.id_length = 3;
        let bytes = file(h, &[0xAA, 0xBB, 0xCC, 7, 8, 9]);
        let img = TgaImage::from_bytes(&bytes).unwrap();
        assert_eq!(img.data(), &[7, 8, 9, 255]);
    }

    #[test]
    fn unsupported_variants_are_classified() {
        let mut mapped = header(2, 24, 1, 1, 0);
        mapped.color_map_type = 1;
        assert!(matches!(
            TgaImage::from_bytes(&file(mapped, &[0; 3])),
            Err(TgaError::ColorMapped)
        ));
        assert!(matches!(
            TgaImage::from_bytes(&file(header(1, 8, 1, 1, 0), &[0])),
            Err(TgaError::Paletted)
        ));
        assert!(matches!(
            TgaImage::from_bytes(&file(header(10, 24, 1, 1, 0), &[0; 4])),
            Err(TgaError::Compressed)
        ));
        assert!(matches!(
            TgaImage::from_bytes(&file(header(3, 8, 1, 1, 0), &[0])),
            Err(TgaError::UnsupportedImageType(3))
        ));
        assert!(matches!(
            TgaImage::from_bytes(&file(header(2, 16, 1, 1, 0), &[0; 2])),
            Err(TgaError::UnsupportedPixelDepth(16))
        ));
        assert!(matches!(
            TgaImage::from_bytes(&file(header(2, 32, 0, 4, 0), &[])),
            Err(TgaError::EmptyImage)
        ));
    }

    #[test]
    fn missing_pixels_are_truncated() {
        let bytes = file(header(2, 32, 2, 2, 0), &[0; 12]);
        assert!(matches!(
            TgaImage::from_bytes(&bytes),
            Err(TgaError::Truncated { expected: 34, actual: 30 })
        ));
    }

    #[test]
    fn encoder_output_decodes_to_same_pixels() {
        let src = TgaImage::from_bgra(2, 2, (0u8..16).collect()).unwrap();
        let back = TgaImage::from_bytes(&src.to_tga_bytes()).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn from_bgra_checks_length() {
        assert!(matches!(
            TgaImage::from_bgra(2, 2, vec![0; 15]),
            Err(TgaError::DataLength { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn to_rgba_swaps_red_and_blue() {
        let img = TgaImage::from_bgra(1, 1, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(img.to_rgba(), vec![3, 2, 1, 4]);
    }
}
