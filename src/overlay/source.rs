//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“用户输入”和“流水线中间结果”解耦：
//! - `SourceImage` 表示用户选择的原始文件
//! - `BoundedImage` 表示降采样并重新编码后的 JPEG
//! - `OverlayRequest` 表示一次待提交的完整请求
//! - `ProcessedImage` 表示处理服务返回的结果
//!
//! 二进制内容统一使用 `bytes::Bytes`，会话、预览与请求之间共享时只做引用计数拷贝。

use bytes::Bytes;

/// 用户选择的原始图片。
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// 原始文件字节。
    pub bytes: Bytes,
    /// 声明的媒体类型（如 `image/png`）。
    pub media_type: String,
    /// 展示用文件名。
    pub name: String,
}

impl SourceImage {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            name: name.into(),
        }
    }
}

/// 降采样后的 JPEG 图片。
///
/// 不变式：`width <= max_width && height <= max_height`，且宽高比保持不变。
#[derive(Debug, Clone)]
pub struct BoundedImage {
    /// JPEG 编码字节。
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    /// 编码时使用的 JPEG 质量（1~100）。
    pub quality: u8,
    /// 沿用源文件的展示名。
    pub name: String,
}

impl BoundedImage {
    pub const MEDIA_TYPE: &'static str = "image/jpeg";
}

/// 一次提交的完整输入。
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub image: BoundedImage,
    pub text: String,
    pub font_size: u32,
}

/// 处理服务返回的图片。
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    /// 媒体类型：优先按字节签名识别，其次取响应头。
    pub media_type: String,
}

impl ProcessedImage {
    /// 按媒体类型推导下载文件名。
    pub fn suggested_file_name(&self) -> String {
        let extension = infer::get(&self.bytes)
            .map(|kind| kind.extension())
            .unwrap_or_else(|| extension_for_media_type(&self.media_type));
        format!("processed-image.{}", extension)
    }
}

fn extension_for_media_type(media_type: &str) -> &'static str {
    match media_type.split(';').next().unwrap_or_default().trim() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_name_prefers_signature() {
        let png_magic = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let image = ProcessedImage {
            bytes: Bytes::from(png_magic),
            media_type: "image/jpeg".to_string(),
        };
        assert_eq!(image.suggested_file_name(), "processed-image.png");
    }

    #[test]
    fn suggested_name_falls_back_to_media_type() {
        let image = ProcessedImage {
            bytes: Bytes::from_static(b"opaque"),
            media_type: "image/webp; charset=binary".to_string(),
        };
        assert_eq!(image.suggested_file_name(), "processed-image.webp");

        let unknown = ProcessedImage {
            bytes: Bytes::from_static(b"opaque"),
            media_type: "application/octet-stream".to_string(),
        };
        assert_eq!(unknown.suggested_file_name(), "processed-image.png");
    }
}
