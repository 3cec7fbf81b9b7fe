//! # 降采样流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → 缩放 → JPEG”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸，按像素/内存上限快速拒绝
//! 2. 完整解码，并按 EXIF 方向摆正
//! 3. 两步夹取计算目标尺寸（先宽后高），保持宽高比且不放大
//! 4. `fast_image_resize` 缩放，失败时回退 `image::imageops::resize`
//! 5. 以固定质量重新编码为 JPEG

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageDecoder, ImageReader, Rgb};
use std::io::Cursor;
use std::time::Instant;

use super::source::{BoundedImage, SourceImage};
use super::{OverlayConfig, OverlayError, OverlayHandler};

/// 计算降采样后的尺寸。
///
/// 先按宽度夹取，再对（已缩放的）高度夹取，两步都等比缩放。
/// 中间值保留小数，最后截断为整数（至少 1 像素）。
///
/// # 示例
/// ```rust
/// use image_overlay_editor::overlay::bounded_dimensions;
///
/// assert_eq!(bounded_dimensions(4000, 3000, 1024, 1024), (1024, 768));
/// assert_eq!(bounded_dimensions(800, 600, 1024, 1024), (800, 600));
/// ```
pub fn bounded_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = f64::from(width);
    let mut h = f64::from(height);
    let max_w = f64::from(max_width);
    let max_h = f64::from(max_height);

    if w > max_w {
        h *= max_w / w;
        w = max_w;
    }
    if h > max_h {
        w *= max_h / h;
        h = max_h;
    }

    ((w as u32).max(1), (h as u32).max(1))
}

impl OverlayHandler {
    /// 将源图降采样并编码为 JPEG。
    ///
    /// 同步执行，由 `downscale` 放到阻塞线程池中调用。
    pub(crate) fn downscale_blocking(
        source: &SourceImage,
        config: &OverlayConfig,
    ) -> Result<BoundedImage, OverlayError> {
        let decode_start = Instant::now();

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&source.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = Self::decode_oriented(&source.bytes)?;
        let (raw_width, raw_height) = (decoded.width(), decoded.height());
        let decode_elapsed = decode_start.elapsed();

        let (target_width, target_height) =
            bounded_dimensions(raw_width, raw_height, config.max_width, config.max_height);

        let resize_start = Instant::now();
        let rgb = if (target_width, target_height) == (raw_width, raw_height) {
            decoded.into_rgb8()
        } else {
            Self::resize(decoded, target_width, target_height, config.resize_filter)
        };
        let resize_elapsed = resize_start.elapsed();

        let encode_start = Instant::now();
        let bytes = Self::encode_jpeg(rgb, config.jpeg_quality)?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 降采样完成 - {} 原始尺寸: {}x{} 输出尺寸: {}x{} 质量: {} 体积: {}KB decode={}ms resize={}ms encode={}ms",
            source.name,
            raw_width,
            raw_height,
            target_width,
            target_height,
            config.jpeg_quality,
            bytes.len() / 1024,
            decode_elapsed.as_millis(),
            resize_elapsed.as_millis(),
            encode_elapsed.as_millis()
        );

        Ok(BoundedImage {
            bytes: bytes.into(),
            width: target_width,
            height: target_height,
            quality: config.jpeg_quality,
            name: source.name.clone(),
        })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), OverlayError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| OverlayError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| OverlayError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    /// 完整解码，并按 EXIF 方向旋转/翻转。
    fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, OverlayError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| OverlayError::InvalidFormat(format!("无法识别图片格式：{}", e)))?
            .into_decoder()
            .map_err(|e| OverlayError::Decode(format!("图片解码失败：{}", e)))?;

        let orientation = decoder.orientation().unwrap_or(image::metadata::Orientation::NoTransforms);

        let mut decoded = DynamicImage::from_decoder(decoder)
            .map_err(|e| OverlayError::Decode(format!("图片解码失败：{}", e)))?;
        decoded.apply_orientation(orientation);

        Ok(decoded)
    }

    fn validate_pixel_limits(config: &OverlayConfig, width: u32, height: u32) -> Result<(), OverlayError> {
        let pixels = u64::from(width)
            .checked_mul(u64::from(height))
            .ok_or_else(|| OverlayError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(OverlayError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &OverlayConfig,
        width: u32,
        height: u32,
    ) -> Result<(), OverlayError> {
        let estimated = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| OverlayError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(OverlayError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    fn resize(
        image: DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        let rgb = image.into_rgb8();

        match Self::resize_with_fast_image_resize(&rgb, target_width, target_height, filter) {
            Ok(resized) => resized,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize：{}", err);
                image::imageops::resize(&rgb, target_width, target_height, filter)
            }
        }
    }

    fn resize_with_fast_image_resize(
        src: &ImageBuffer<Rgb<u8>, Vec<u8>>,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, OverlayError> {
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.as_raw().clone(),
            fr::PixelType::U8x3,
        )
        .map_err(|e| OverlayError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x3);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| OverlayError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| OverlayError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    fn to_fast_filter(filter: image::imageops::FilterType) -> fr::FilterType {
        match filter {
            image::imageops::FilterType::Nearest => fr::FilterType::Box,
            image::imageops::FilterType::Triangle => fr::FilterType::Bilinear,
            image::imageops::FilterType::CatmullRom => fr::FilterType::CatmullRom,
            image::imageops::FilterType::Gaussian => fr::FilterType::Mitchell,
            image::imageops::FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }

    fn encode_jpeg(rgb: ImageBuffer<Rgb<u8>, Vec<u8>>, quality: u8) -> Result<Vec<u8>, OverlayError> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| OverlayError::Encode(format!("JPEG 编码失败：{}", e)))?;

        let bytes = buf.into_inner();
        if bytes.is_empty() {
            return Err(OverlayError::Encode("JPEG 编码结果为空".to_string()));
        }

        Ok(bytes)
    }
}
