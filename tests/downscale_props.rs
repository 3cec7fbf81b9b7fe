// Property tests for bounding-box downscaling
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgba};
use image_overlay_editor::overlay::{OverlayConfig, OverlayHandler, SourceImage, bounded_dimensions};
use proptest::prelude::*;
use std::io::Cursor;
use tokio::runtime::Runtime;

fn encoded_source(width: u32, height: u32, format: ImageFormat) -> SourceImage {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, ((x * y) % 255) as u8, 255])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, format)
        .expect("failed to encode test image");
    SourceImage::new(cursor.into_inner(), format.to_mime_type(), "prop-image")
}

proptest! {
    #[test]
    fn never_upscales_images_inside_the_box(
        max_w in 1u32..4096,
        max_h in 1u32..4096,
        w_frac in 0.0f64..=1.0,
        h_frac in 0.0f64..=1.0,
    ) {
        let width = ((max_w as f64 * w_frac) as u32).max(1);
        let height = ((max_h as f64 * h_frac) as u32).max(1);
        prop_assert_eq!(bounded_dimensions(width, height, max_w, max_h), (width, height));
    }

    #[test]
    fn oversized_images_fit_the_box_and_keep_aspect_ratio(
        width in 1u32..20_000,
        height in 1u32..20_000,
        max_w in 1u32..4096,
        max_h in 1u32..4096,
    ) {
        prop_assume!(width > max_w || height > max_h);

        let (out_w, out_h) = bounded_dimensions(width, height, max_w, max_h);
        prop_assert!(out_w <= max_w, "width {} exceeds {}", out_w, max_w);
        prop_assert!(out_h <= max_h, "height {} exceeds {}", out_h, max_h);
        prop_assert!(out_w == max_w || out_h == max_h, "no side touches the box: {}x{}", out_w, out_h);

        // 截断误差不超过 1 像素
        let cross_out = u64::from(out_w) * u64::from(height);
        let cross_in = u64::from(out_h) * u64::from(width);
        let tolerance = 2 * u64::from(width.max(height));
        prop_assert!(
            cross_out.abs_diff(cross_in) <= tolerance,
            "aspect drift {}x{} -> {}x{}", width, height, out_w, out_h
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn output_is_always_jpeg_within_bounds(
        width in 1u32..300,
        height in 1u32..300,
        max_side in 16u32..200,
        format_idx in 0usize..3,
    ) {
        let format = [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Tiff][format_idx];
        let mut config = OverlayConfig::default();
        config.max_width = max_side;
        config.max_height = max_side;

        let handler = OverlayHandler::new(config).expect("handler init failed");
        let runtime = Runtime::new().expect("runtime init failed");
        let bounded = runtime
            .block_on(handler.downscale(encoded_source(width, height, format)))
            .expect("downscale should succeed");

        prop_assert_eq!(image::guess_format(&bounded.bytes).ok(), Some(ImageFormat::Jpeg));
        prop_assert_eq!(
            (bounded.width, bounded.height),
            bounded_dimensions(width, height, max_side, max_side)
        );

        let decoded = image::load_from_memory(&bounded.bytes).expect("jpeg should decode");
        prop_assert_eq!(decoded.dimensions(), (bounded.width, bounded.height));
    }
}

#[test]
fn large_landscape_photo_becomes_1024_by_768() {
    let handler = OverlayHandler::new(OverlayConfig::default()).expect("handler init failed");
    let runtime = Runtime::new().expect("runtime init failed");

    let bounded = runtime
        .block_on(handler.downscale(encoded_source(4000, 3000, ImageFormat::Png)))
        .expect("downscale should succeed");

    assert_eq!((bounded.width, bounded.height), (1024, 768));
    assert_eq!(bounded.quality, 80);
}

#[test]
fn selected_file_on_disk_is_downscaled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tall.bmp");
    std::fs::write(&path, &encoded_source(300, 1200, ImageFormat::Bmp).bytes).expect("write source");

    let mut config = OverlayConfig::default();
    config.max_width = 256;
    config.max_height = 256;
    let handler = OverlayHandler::new(config).expect("handler init failed");
    let runtime = Runtime::new().expect("runtime init failed");

    let bounded = runtime
        .block_on(handler.load_and_downscale(&path))
        .expect("downscale should succeed");

    assert_eq!((bounded.width, bounded.height), (64, 256));
    assert_eq!(bounded.name, "tall.bmp");
}
