use std::io::Cursor;

use clarity_perturb::{image_hash, CanonicalImage};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage, Rgba, RgbaImage};
use tempfile::tempdir;

fn sample() -> CanonicalImage {
    let pixels: Vec<u8> = (0..4 * 3 * 3).map(|v| (v * 7 % 256) as u8).collect();
    CanonicalImage::new(4, 3, pixels).unwrap()
}

#[test]
fn hash_is_stable_across_calls() {
    let image = sample();
    assert_eq!(image_hash(&image), image_hash(&image));
    assert_eq!(image_hash(&image), image.content_hash());
}

#[test]
fn hash_covers_dimensions() {
    let pixels = vec![9u8; 12];
    let wide = CanonicalImage::new(4, 1, pixels.clone()).unwrap();
    let tall = CanonicalImage::new(1, 4, pixels).unwrap();
    assert_ne!(image_hash(&wide), image_hash(&tall));
}

#[test]
fn hash_ignores_container_encoding() {
    let image = sample();
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.png");
    image.save_png(&path).unwrap();
    let reloaded = CanonicalImage::load(&path).unwrap();
    assert_eq!(image_hash(&reloaded), image_hash(&image));

    let rgb = RgbImage::from_raw(4, 3, image.pixels().to_vec()).unwrap();
    let mut bmp_like = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut bmp_like, ImageFormat::Png)
        .unwrap();
    let decoded = CanonicalImage::from_encoded(bmp_like.get_ref()).unwrap();
    assert_eq!(image_hash(&decoded), image_hash(&image));
}

#[test]
fn grayscale_and_alpha_inputs_canonicalize_to_rgb() {
    let gray = GrayImage::from_pixel(2, 2, Luma([77]));
    let canonical = CanonicalImage::from_dynamic(&DynamicImage::ImageLuma8(gray)).unwrap();
    assert_eq!(canonical.pixel(1, 1), [77, 77, 77]);

    let rgba = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0]));
    let canonical = CanonicalImage::from_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap();
    assert_eq!(canonical.pixel(0, 0), [1, 2, 3]);
    assert_eq!(canonical.pixels().len(), 12);
}

#[test]
fn malformed_buffers_are_rejected() {
    let err = CanonicalImage::new(2, 2, vec![0; 11]).expect_err("short buffer");
    assert_eq!(err.info().code, "image.buffer_len");
    let err = CanonicalImage::new(0, 2, Vec::new()).expect_err("empty");
    assert_eq!(err.info().code, "image.empty");
    let err = CanonicalImage::from_encoded(b"not an image").expect_err("garbage");
    assert!(matches!(err, clarity_core::ClarityError::Image(_)));
}
