//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理用户所选文件的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 签名：使用 `infer` 识别真实类型，非图片直接拒绝。
//! - 媒体类型优先取签名识别结果，识别不到时按扩展名推断。

use std::path::Path;

use super::source::SourceImage;
use super::{OverlayConfig, OverlayError, OverlayHandler};

impl OverlayHandler {
    /// 从本地文件加载源图。
    pub(super) fn load_from_file(
        &self,
        path: &Path,
        config: &OverlayConfig,
    ) -> Result<SourceImage, OverlayError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        if !path.exists() {
            return Err(OverlayError::FileSystem(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| OverlayError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if !metadata.is_file() {
            return Err(OverlayError::FileSystem(format!("不是普通文件：{}", path.display())));
        }

        if metadata.len() > config.max_file_size {
            return Err(OverlayError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| OverlayError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        let media_type = Self::sniff_media_type(&bytes, path);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        log::debug!("📄 源图已读取 - {} ({}, {} KB)", name, media_type, bytes.len() / 1024);

        Ok(SourceImage::new(bytes, media_type, name))
    }

    /// 校验字节签名是否为图片。
    pub(super) fn validate_image_signature(bytes: &[u8]) -> Result<(), OverlayError> {
        if bytes.is_empty() {
            return Err(OverlayError::InvalidFormat("图片内容为空".to_string()));
        }

        // 部分格式（如 TGA）没有可识别签名，交由解码阶段判断
        if let Some(kind) = infer::get(bytes) {
            if kind.matcher_type() != infer::MatcherType::Image {
                return Err(OverlayError::InvalidFormat(format!(
                    "文件签名不是图片类型：{}",
                    kind.mime_type()
                )));
            }
        }

        Ok(())
    }

    fn sniff_media_type(bytes: &[u8], path: &Path) -> String {
        if let Some(kind) = infer::get(bytes) {
            return kind.mime_type().to_string();
        }

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        image::ImageFormat::from_extension(&extension)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}
