// tests/test_tga.rs — TGA loading through the file system, cross-checked
// against the `image` crate's decoder.

use std::path::PathBuf;

use vox_compute::tga::{TgaError, TgaHeader, HEADER_LEN};
use vox_compute::TgaImage;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vox_compute_{}_{}", std::process::id(), name))
}

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

/// A w x h test pattern as BGR(A) bytes with rows in the given order.
fn pattern(w: u16, h: u16, bpp: usize, bottom_first: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for row in 0..h {
        let y = if bottom_first { h - 1 - row } else { row };
        for x in 0..w {
            out.push((x * 40) as u8);
            out.push((y * 60) as u8);
            out.push(((x + y) * 25) as u8);
            if bpp == 4 {
                out.push(200 - (x as u8));
            }
        }
    }
    out
}

fn encode(h: TgaHeader, pixels: &[u8]) -> Vec<u8> {
    let mut out = h.to_bytes().to_vec();
    out.extend_from_slice(pixels);
    out
}

// ===== Loading from disk =====

#[test]
fn accepted_file_has_consistent_length() {
    let path = temp_path("accepted.tga");
    std::fs::write(&path, encode(header(2, 24, 5, 3, 0), &pattern(5, 3, 3, true))).unwrap();

    let img = TgaImage::load(&path).expect("valid TGA should load");
    assert_eq!(img.width(), 5);
    assert_eq!(img.height(), 3);
    assert_eq!(img.data().len(), (img.width() * img.height() * 4) as usize);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_yields_no_image() {
    let path = temp_path("does_not_exist.tga");
    assert!(TgaImage::load(&path).is_none());
    assert!(matches!(TgaImage::open(&path), Err(TgaError::Io(_))));
}

#[test]
fn rejected_variants_yield_no_image() {
    let mut mapped = header(1, 8, 2, 2, 0);
    mapped.color_map_type = 1;
    mapped.color_map_length = 2;
    mapped.color_map_depth = 24;
    let cases = [
        ("rle.tga", encode(header(10, 24, 2, 2, 0), &[0x83, 1, 2, 3])),
        ("paletted.tga", encode(header(1, 8, 2, 2, 0), &[0; 4])),
        ("mapped.tga", encode(mapped, &[0; 10])),
    ];
    for (name, bytes) in cases {
        let path = temp_path(name);
        std::fs::write(&path, bytes).unwrap();
        assert!(TgaImage::load(&path).is_none(), "{name} should be rejected");
        let _ = std::fs::remove_file(&path);
    }
}

#[test]
fn saved_image_reloads_identically() {
    let path = temp_path("saved.tga");
    let img = TgaImage::from_bgra(3, 2, (0..24).map(|v| v as u8 * 10).collect()).unwrap();
    img.save(&path).unwrap();
    let back = TgaImage::open(&path).unwrap();
    assert_eq!(back, img);

    let bytes = std::fs::read(&path).unwrap();
    let h = TgaHeader::parse(&bytes).unwrap();
    assert!(h.top_origin());
    assert_eq!(bytes.len(), HEADER_LEN + 24);
    let _ = std::fs::remove_file(&path);
}

// ===== Orientation =====

#[test]
fn bottom_and_top_origin_decode_identically() {
    let bottom = encode(header(2, 32, 4, 3, 0x08), &pattern(4, 3, 4, true));
    let top = encode(header(2, 32, 4, 3, 0x28), &pattern(4, 3, 4, false));
    assert_eq!(
        TgaImage::from_bytes(&bottom).unwrap(),
        TgaImage::from_bytes(&top).unwrap()
    );
}

// ===== Agreement with the image crate =====

#[test]
fn agrees_with_image_crate_24bit_bottom_origin() {
    let bytes = encode(header(2, 24, 6, 4, 0), &pattern(6, 4, 3, true));
    let ours = TgaImage::from_bytes(&bytes).unwrap();
    let theirs = image::load_from_memory_with_format(&bytes, image::ImageFormat::Tga)
        .unwrap()
        .to_rgba8();
    assert_eq!((theirs.width(), theirs.height()), (6, 4));
    assert_eq!(ours.to_rgba(), theirs.into_raw());
}

#[test]
fn agrees_with_image_crate_32bit_top_origin() {
    let bytes = encode(header(2, 32, 3, 5, 0x28), &pattern(3, 5, 4, false));
    let ours = TgaImage::from_bytes(&bytes).unwrap();
    let theirs = image::load_from_memory_with_format(&bytes, image::ImageFormat::Tga)
        .unwrap()
        .to_rgba8();
    assert_eq!(ours.to_rgba(), theirs.into_raw());
}
