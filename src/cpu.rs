// ============================================================================
// CPU GRAYSCALE — reference path for machines without a usable GPU
// ============================================================================

use rayon::prelude::*;

use crate::tga::{TgaError, TgaImage};

/// Rec.709 luma weights, applied to (r, g, b).
pub const REC709_LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Rows handed to each rayon task.
const ROWS_PER_TASK: usize = 16;

/// Luma of one BGRA pixel, quantised like a unorm8 store.
#[inline]
pub fn luma_bgra(px: &[u8]) -> u8 {
    let b = px[0] as f32 / 255.0;
    let g = px[1] as f32 / 255.0;
    let r = px[2] as f32 / 255.0;
    let y = r * REC709_LUMA[0] + g * REC709_LUMA[1] + b * REC709_LUMA[2];
    (y.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Grayscale a BGRA buffer; every output pixel is (y, y, y, 255).
/// Channel order is irrelevant for the gray channels, so the result is
/// valid as either BGRA or RGBA.
pub fn grayscale_bgra(data: &[u8], width: u32) -> Vec<u8> {
    let row_bytes = width as usize * 4;
    let mut out = vec![0u8; data.len()];
    if row_bytes == 0 {
        return out;
    }
    out.par_chunks_mut(row_bytes * ROWS_PER_TASK)
        .zip(data.par_chunks(row_bytes * ROWS_PER_TASK))
        .for_each(|(dst, src)| {
            for (o, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let y = luma_bgra(px);
                o.copy_from_slice(&[y, y, y, 255]);
            }
        });
    out
}

pub fn grayscale(image: &TgaImage) -> Result<TgaImage, TgaError> {
    let data = grayscale_bgra(image.data(), image.width());
    TgaImage::from_bgra(image.width(), image.height(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_follow_rec709() {
        assert_eq!(luma_bgra(&[0, 0, 255, 255]), 54); // red:   0.2126 * 255
        assert_eq!(luma_bgra(&[0, 255, 0, 255]), 182); // green: 0.7152 * 255
        assert_eq!(luma_bgra(&[255, 0, 0, 255]), 18); // blue:  0.0722 * 255
        assert_eq!(luma_bgra(&[255, 255, 255, 0]), 255);
    }

    #[test]
    fn output_is_opaque_gray() {
        let src: Vec<u8> = (0..40u8).map(|v| v.wrapping_mul(37)).collect();
        let out = grayscale_bgra(&src, 5);
        assert_eq!(out.len(), src.len());
        for px in out.chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn image_extent_is_kept() {
        let img = TgaImage::from_bgra(3, 2, vec![100; 24]).unwrap();
        let gray = grayscale(&img).unwrap();
        assert_eq!((gray.width(), gray.height()), (3, 2));
        assert_eq!(gray.data()[..4], [100, 100, 100, 255]);
    }
}
