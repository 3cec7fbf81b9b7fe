//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `OverlayConfig`，保证运行时行为可观测、可调整、可测试。
//! 最大包围盒与 JPEG 质量属于调优常量，不是对外契约，因此全部放在配置里。
//!
//! ## 实现思路
//!
//! - `Default` 提供 1024×1024、质量 80 的默认配置。
//! - `ResizeProfile` 负责档位字符串解析与反向输出，映射到缩放滤镜。
//! - `validate` 在构建处理器与更新配置时统一做范围校验。

use image::imageops::FilterType;

use super::OverlayError;

/// 图片叠加客户端配置。
///
/// 字段覆盖了读取、解码、降采样、编码与提交五个阶段。
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// 降采样后的最大宽度（像素）。
    pub max_width: u32,
    /// 降采样后的最大高度（像素）。
    pub max_height: u32,
    /// JPEG 编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 降采样滤镜策略。
    pub resize_filter: FilterType,
    /// 读取源文件时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码前允许的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGB 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 处理服务地址。
    pub endpoint: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            jpeg_quality: 80,
            resize_filter: FilterType::Triangle,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            endpoint: None,
        }
    }
}

/// 缩放档位（面向用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先处理速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeProfile {
    Quality,
    Balanced,
    Speed,
}

impl ResizeProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_overlay_editor::overlay::ResizeProfile;
    ///
    /// let p = ResizeProfile::parse("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_overlay_editor::overlay::OverlayError>(())
    /// ```
    pub fn parse(profile: &str) -> Result<Self, OverlayError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(OverlayError::Config(format!(
                "未知缩放档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }

    fn filter(self) -> FilterType {
        match self {
            Self::Quality => FilterType::Lanczos3,
            Self::Balanced => FilterType::Triangle,
            Self::Speed => FilterType::Nearest,
        }
    }
}

impl OverlayConfig {
    /// 基于当前滤镜反推档位。
    pub fn infer_resize_profile(&self) -> ResizeProfile {
        match self.resize_filter {
            FilterType::Nearest => ResizeProfile::Speed,
            FilterType::Lanczos3 | FilterType::CatmullRom | FilterType::Gaussian => {
                ResizeProfile::Quality
            }
            FilterType::Triangle => ResizeProfile::Balanced,
        }
    }

    pub fn apply_resize_profile(&mut self, profile: ResizeProfile) {
        self.resize_filter = profile.filter();
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), OverlayError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(OverlayError::Config(format!(
                "最大尺寸必须为正数：{}x{}",
                self.max_width, self.max_height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(OverlayError::Config(format!(
                "jpeg_quality 必须在 1~100 之间：{}",
                self.jpeg_quality
            )));
        }
        if self.max_file_size == 0 {
            return Err(OverlayError::Config("max_file_size 不能为 0".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            validate_endpoint(endpoint)?;
        }
        Ok(())
    }

    /// 返回已配置的处理服务地址。
    pub fn require_endpoint(&self) -> Result<reqwest::Url, OverlayError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| OverlayError::Config("未配置处理服务地址（OVERLAY_API_URL）".to_string()))?;
        validate_endpoint(endpoint)
    }
}

/// 解析并校验处理服务地址，仅允许 http/https。
fn validate_endpoint(endpoint: &str) -> Result<reqwest::Url, OverlayError> {
    let url = reqwest::Url::parse(endpoint.trim())
        .map_err(|e| OverlayError::Config(format!("处理服务地址格式错误：{}", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(OverlayError::Config(format!(
            "处理服务地址仅支持 http/https：{}",
            other
        ))),
    }
}
