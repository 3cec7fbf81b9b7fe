//! 应用设置模块
//!
//! # 设计思路
//!
//! 处理服务地址是唯一必填设置，部署时通过环境变量 `OVERLAY_API_URL` 注入；
//! 包围盒、质量、档位等调优常量可以放在可选的 JSON 设置文件里。
//!
//! # 实现思路
//!
//! - 优先级：命令行参数 > 环境变量 > 设置文件 > 默认值。
//! - `OverlaySettings` 字段全部可选，`merge` 按字段覆盖。
//! - `into_config` 转为 `OverlayConfig` 并做统一校验。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::overlay::{OverlayConfig, ResizeProfile};

/// 处理服务地址环境变量
pub const ENDPOINT_ENV: &str = "OVERLAY_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlaySettings {
    pub endpoint: Option<String>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub profile: Option<String>,
    pub max_file_size_mb: Option<u64>,
}

impl OverlaySettings {
    /// 读取 JSON 设置文件
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件 '{}' 失败: {}", path.display(), e)))
    }

    /// 从环境变量读取
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.trim().is_empty()),
            ..Self::default()
        }
    }

    /// 用 `other` 中已设置的字段覆盖当前值
    pub fn merge(self, other: Self) -> Self {
        Self {
            endpoint: other.endpoint.or(self.endpoint),
            max_width: other.max_width.or(self.max_width),
            max_height: other.max_height.or(self.max_height),
            jpeg_quality: other.jpeg_quality.or(self.jpeg_quality),
            profile: other.profile.or(self.profile),
            max_file_size_mb: other.max_file_size_mb.or(self.max_file_size_mb),
        }
    }

    pub fn into_config(self) -> Result<OverlayConfig, AppError> {
        let mut config = OverlayConfig::default();

        if let Some(max_width) = self.max_width {
            config.max_width = max_width;
        }
        if let Some(max_height) = self.max_height {
            config.max_height = max_height;
        }
        if let Some(quality) = self.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if let Some(profile) = self.profile.as_deref() {
            config.apply_resize_profile(ResizeProfile::parse(profile)?);
        }
        if let Some(mb) = self.max_file_size_mb {
            config.max_file_size = mb
                .checked_mul(1024 * 1024)
                .ok_or_else(|| AppError::Settings(format!("max_file_size_mb 过大: {}", mb)))?;
        }
        config.endpoint = self.endpoint;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn later_sources_override_earlier_ones() {
        let file = OverlaySettings {
            endpoint: Some("http://file.example/api".to_string()),
            max_width: Some(800),
            ..OverlaySettings::default()
        };
        let cli = OverlaySettings {
            endpoint: Some("http://cli.example/api".to_string()),
            ..OverlaySettings::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.endpoint.as_deref(), Some("http://cli.example/api"));
        assert_eq!(merged.max_width, Some(800));
    }

    #[test]
    fn into_config_applies_fields() {
        let config = OverlaySettings {
            endpoint: Some("https://api.example.com/overlay".to_string()),
            max_width: Some(640),
            max_height: Some(480),
            jpeg_quality: Some(90),
            profile: Some("speed".to_string()),
            max_file_size_mb: Some(5),
        }
        .into_config()
        .expect("valid settings");

        assert_eq!((config.max_width, config.max_height, config.jpeg_quality), (640, 480, 90));
        assert_eq!(config.infer_resize_profile(), ResizeProfile::Speed);
        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
    }

    #[test]
    fn into_config_rejects_bad_endpoint() {
        let result = OverlaySettings {
            endpoint: Some("file:///etc/passwd".to_string()),
            ..OverlaySettings::default()
        }
        .into_config();
        assert!(matches!(result, Err(AppError::Overlay(_))));
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "max_width": 512, "jpeg_quality": 75 }}"#).expect("write settings");

        let settings = OverlaySettings::load(file.path()).expect("load settings");
        assert_eq!(settings.max_width, Some(512));
        assert_eq!(settings.jpeg_quality, Some(75));
        assert_eq!(settings.endpoint, None);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "max_widht": 512 }}"#).expect("write settings");
        assert!(matches!(OverlaySettings::load(file.path()), Err(AppError::Settings(_))));
    }
}
