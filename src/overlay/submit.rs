//! # 提交模块
//!
//! ## 设计思路
//!
//! 提交分两步：先在本地校验表单（失败不发起任何网络请求），
//! 再把图片、文字、字号打包为 multipart 请求，对处理服务做一次 POST。
//!
//! ## 实现思路
//!
//! - `build_request`：按 图片 → 文字 → 字号 的顺序校验，返回首个出错字段。
//! - `send_request`：单次请求，不重试、不排队；非 2xx、网络错误、空响应体都视为提交失败。
//! - 响应体按不透明字节处理，媒体类型优先按签名识别，其次取 `Content-Type`。

use reqwest::multipart::{Form, Part};

use super::source::{BoundedImage, OverlayRequest, ProcessedImage};
use super::{FormField, OverlayError, OverlayHandler};

/// multipart 图片字段名。
pub const FIELD_FILE: &str = "file";
/// multipart 文字字段名。
pub const FIELD_TEXT: &str = "text";
/// multipart 字号字段名。
pub const FIELD_SIZE: &str = "size";

/// 解析字号输入，必须为正整数。
///
/// # 示例
/// ```rust
/// use image_overlay_editor::overlay::parse_font_size;
///
/// assert_eq!(parse_font_size(" 24 ").ok(), Some(24));
/// assert!(parse_font_size("-5").is_err());
/// assert!(parse_font_size("abc").is_err());
/// ```
pub fn parse_font_size(raw: &str) -> Result<u32, OverlayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OverlayError::validation(FormField::Size, "请输入文字大小"));
    }

    let value: i64 = trimmed
        .parse()
        .map_err(|_| OverlayError::validation(FormField::Size, format!("文字大小必须是整数：{}", trimmed)))?;

    if value <= 0 {
        return Err(OverlayError::validation(
            FormField::Size,
            format!("文字大小必须大于 0：{}", value),
        ));
    }

    u32::try_from(value)
        .map_err(|_| OverlayError::validation(FormField::Size, format!("文字大小超出范围：{}", value)))
}

/// 校验表单并组装提交请求。
pub fn build_request(
    image: Option<&BoundedImage>,
    text: &str,
    size: &str,
) -> Result<OverlayRequest, OverlayError> {
    let image = image.ok_or_else(|| OverlayError::validation(FormField::File, "请先选择一张图片"))?;

    if text.is_empty() {
        return Err(OverlayError::validation(FormField::Text, "请输入要叠加的文字"));
    }

    let font_size = parse_font_size(size)?;

    Ok(OverlayRequest {
        image: image.clone(),
        text: text.to_string(),
        font_size,
    })
}

impl OverlayHandler {
    /// 发送一次提交请求。
    pub(super) async fn send_request(
        &self,
        request: &OverlayRequest,
        endpoint: reqwest::Url,
    ) -> Result<ProcessedImage, OverlayError> {
        let form = Self::build_form(request)?;

        log::debug!("📡 发送 multipart 请求 - {}", endpoint);
        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OverlayError::Network(format!("请求处理服务失败：{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("⚠️ 处理服务返回非成功状态：{}", status);
            return Err(OverlayError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let header_media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OverlayError::MalformedResponse(format!("读取响应体失败：{}", e)))?;

        if bytes.is_empty() {
            return Err(OverlayError::MalformedResponse("响应体为空".to_string()));
        }

        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .or(header_media_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(ProcessedImage { bytes, media_type })
    }

    fn build_form(request: &OverlayRequest) -> Result<Form, OverlayError> {
        let image_part = Part::bytes(request.image.bytes.to_vec())
            .file_name(request.image.name.clone())
            .mime_str(BoundedImage::MEDIA_TYPE)
            .map_err(|e| OverlayError::State(format!("构建图片字段失败：{}", e)))?;

        Ok(Form::new()
            .part(FIELD_FILE, image_part)
            .text(FIELD_TEXT, request.text.clone())
            .text(FIELD_SIZE, request.font_size.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bounded() -> BoundedImage {
        BoundedImage {
            bytes: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            width: 1,
            height: 1,
            quality: 80,
            name: "photo.jpg".to_string(),
        }
    }

    #[test]
    fn missing_image_is_reported_first() {
        let err = build_request(None, "", "").expect_err("should fail");
        assert_eq!(err.invalid_field(), Some(FormField::File));
    }

    #[test]
    fn empty_text_is_rejected() {
        let image = bounded();
        let err = build_request(Some(&image), "", "24").expect_err("should fail");
        assert_eq!(err.invalid_field(), Some(FormField::Text));
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let image = bounded();
        for size in ["", "   ", "-5", "0", "abc", "12px", "1.5", "99999999999"] {
            let err = build_request(Some(&image), "Hello", size).expect_err("should fail");
            assert_eq!(err.invalid_field(), Some(FormField::Size), "size input {:?}", size);
        }
    }

    #[test]
    fn valid_form_builds_request() {
        let image = bounded();
        let request = build_request(Some(&image), "Hello", "24").expect("should succeed");
        assert_eq!(request.text, "Hello");
        assert_eq!(request.font_size, 24);
        assert_eq!(request.image.name, "photo.jpg");
    }
}
