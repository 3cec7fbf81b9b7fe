//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `OverlayHandler` 只负责流程编排与配置管理，不持有任何会话状态。
//! 两条链路：
//! 1. 选图：读取配置快照 → 加载源文件 → 阻塞线程池中降采样并编码
//! 2. 提交：读取配置快照 → 校验地址 → 单次 multipart POST
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<OverlayConfig>>` 支持运行时动态调整。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 `load/downscale/total` 与 `submit` 阶段耗时，便于性能诊断。

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::source::{BoundedImage, OverlayRequest, ProcessedImage, SourceImage};
use super::{OverlayAdvancedConfig, OverlayConfig, OverlayError, ResizeProfile};

/// 图片叠加处理器。
///
/// 封装了配置状态与 HTTP 客户端，并编排各子模块实现完整流程。
pub struct OverlayHandler {
    pub(super) config: Arc<RwLock<OverlayConfig>>,
    pub(super) client: reqwest::Client,
}

impl OverlayHandler {
    /// 根据初始配置创建处理器。
    ///
    /// 这里同时构建复用型 HTTP 客户端，减少每次请求的初始化开销。
    pub fn new(config: OverlayConfig) -> Result<Self, OverlayError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| OverlayError::Config(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            client,
        })
    }

    /// 获取配置快照。
    pub fn config_snapshot(&self) -> Result<OverlayConfig, OverlayError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| OverlayError::State("配置读取锁已中毒".to_string()))
    }

    pub fn set_resize_profile(&self, profile: ResizeProfile) -> Result<(), OverlayError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| OverlayError::State("配置写入锁已中毒".to_string()))?;
        config.apply_resize_profile(profile);

        log::info!("⚙️ 已切换缩放档位：{:?}（filter={:?}）", profile, config.resize_filter);

        Ok(())
    }

    pub fn get_resize_profile(&self) -> Result<ResizeProfile, OverlayError> {
        let config = self
            .config
            .read()
            .map_err(|_| OverlayError::State("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_resize_profile())
    }

    /// 更新包围盒、质量与资源上限等高级配置。
    ///
    /// 整体校验通过后才写入，失败时保持原配置不变。
    pub fn set_advanced_config(&self, advanced: &OverlayAdvancedConfig) -> Result<(), OverlayError> {
        if !(16..=16_384).contains(&advanced.max_width) || !(16..=16_384).contains(&advanced.max_height) {
            return Err(OverlayError::Config(format!(
                "最大尺寸必须在 16~16384 之间：{}x{}",
                advanced.max_width, advanced.max_height
            )));
        }
        if advanced.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(OverlayError::Config("max_decoded_bytes 不能小于 8MB".to_string()));
        }

        let mut candidate = self.config_snapshot()?;
        candidate.max_width = advanced.max_width;
        candidate.max_height = advanced.max_height;
        candidate.jpeg_quality = advanced.jpeg_quality;
        candidate.max_file_size = advanced.max_file_size;
        candidate.max_decoded_pixels = advanced.max_decoded_pixels;
        candidate.max_decoded_bytes = advanced.max_decoded_bytes;
        candidate.validate()?;

        let mut config = self
            .config
            .write()
            .map_err(|_| OverlayError::State("配置写入锁已中毒".to_string()))?;
        *config = candidate;

        Ok(())
    }

    pub fn get_advanced_config(&self) -> Result<OverlayAdvancedConfig, OverlayError> {
        let config = self.config_snapshot()?;
        Ok(OverlayAdvancedConfig {
            max_width: config.max_width,
            max_height: config.max_height,
            jpeg_quality: config.jpeg_quality,
            max_file_size: config.max_file_size,
            max_decoded_pixels: config.max_decoded_pixels,
            max_decoded_bytes: config.max_decoded_bytes,
        })
    }

    /// 选图主入口：读取文件并降采样。
    pub async fn load_and_downscale(&self, path: &Path) -> Result<BoundedImage, OverlayError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let source = self.load_from_file(path, &config)?;
        let load_elapsed = load_start.elapsed();

        let downscale_start = Instant::now();
        let bounded = Self::downscale_with(source, config).await?;
        let downscale_elapsed = downscale_start.elapsed();

        log::info!(
            "✅ 选图处理完成 - load={}ms downscale={}ms total={}ms",
            load_elapsed.as_millis(),
            downscale_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(bounded)
    }

    /// 对内存中的源图降采样。
    pub async fn downscale(&self, source: SourceImage) -> Result<BoundedImage, OverlayError> {
        let config = self.config_snapshot()?;
        Self::downscale_with(source, config).await
    }

    async fn downscale_with(source: SourceImage, config: OverlayConfig) -> Result<BoundedImage, OverlayError> {
        tokio::task::spawn_blocking(move || Self::downscale_blocking(&source, &config))
            .await
            .map_err(|e| OverlayError::State(format!("降采样任务异常退出：{}", e)))?
    }

    /// 提交主入口：对已校验的请求执行一次往返。
    pub async fn submit(&self, request: &OverlayRequest) -> Result<ProcessedImage, OverlayError> {
        let config = self.config_snapshot()?;
        let endpoint = config.require_endpoint()?;
        let start = Instant::now();

        let processed = self.send_request(request, endpoint).await?;

        log::info!(
            "✅ 处理服务返回成功 - 输入: {}x{} 文字长度: {} 字号: {} 输出: {} {}KB submit={}ms",
            request.image.width,
            request.image.height,
            request.text.chars().count(),
            request.font_size,
            processed.media_type,
            processed.bytes.len() / 1024,
            start.elapsed().as_millis()
        );

        Ok(processed)
    }
}
