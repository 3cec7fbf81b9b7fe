//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `OverlayServiceState` 作为展示层唯一入口，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` 统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 异步调用可并发发起，会话一致性由代数计数与加载标志保证
//!
//! ## 实现思路
//!
//! 会话锁只在同步段内持有，绝不跨 `.await`：
//! - `select_image`：加锁领凭证 → 解锁降采样 → 加锁落地结果
//! - `submit`：加锁校验并置位 → 解锁请求 → 加锁清标志并落地结果

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::preview::PreviewRegistry;
use super::session::{FormSession, SelectionOutcome, SessionSnapshot};
use super::source::{ProcessedImage, SourceImage};
use super::{OverlayConfig, OverlayError, OverlayHandler, ResizeProfile};

/// 可在运行时调整的高级配置。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OverlayAdvancedConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
    pub max_file_size: u64,
    pub max_decoded_pixels: u64,
    pub max_decoded_bytes: u64,
}

/// 图片叠加服务状态。
pub struct OverlayServiceState {
    handler: OverlayHandler,
    registry: PreviewRegistry,
    session: Mutex<FormSession>,
}

impl OverlayServiceState {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_overlay_editor::overlay::OverlayServiceState;
    ///
    /// let service = OverlayServiceState::new()?;
    /// # Ok::<(), image_overlay_editor::overlay::OverlayError>(())
    /// ```
    pub fn new() -> Result<Self, OverlayError> {
        Self::with_config(OverlayConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_overlay_editor::overlay::{OverlayConfig, OverlayServiceState};
    ///
    /// let mut config = OverlayConfig::default();
    /// config.endpoint = Some("https://api.example.com/overlay".into());
    /// let service = OverlayServiceState::with_config(config)?;
    /// # Ok::<(), image_overlay_editor::overlay::OverlayError>(())
    /// ```
    pub fn with_config(config: OverlayConfig) -> Result<Self, OverlayError> {
        let handler = OverlayHandler::new(config)?;
        let registry = PreviewRegistry::new();
        Ok(Self {
            handler,
            session: Mutex::new(FormSession::new(registry.clone())),
            registry,
        })
    }

    fn session(&self) -> Result<MutexGuard<'_, FormSession>, OverlayError> {
        self.session
            .lock()
            .map_err(|_| OverlayError::State("会话状态锁已中毒".to_string()))
    }

    /// 选择本地图片并降采样。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_overlay_editor::overlay::OverlayServiceState;
    ///
    /// # async fn demo() -> Result<(), image_overlay_editor::overlay::OverlayError> {
    /// let service = OverlayServiceState::new()?;
    /// service.select_image("photo.png").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn select_image(&self, path: impl AsRef<Path>) -> Result<SelectionOutcome, OverlayError> {
        let ticket = self.session()?.begin_selection();
        let result = self.handler.load_and_downscale(path.as_ref()).await;
        self.finish_selection(ticket, result)
    }

    /// 选择内存中的图片并降采样。
    pub async fn select_source(&self, source: SourceImage) -> Result<SelectionOutcome, OverlayError> {
        let ticket = self.session()?.begin_selection();
        let result = self.handler.downscale(source).await;
        self.finish_selection(ticket, result)
    }

    fn finish_selection(
        &self,
        ticket: super::session::SelectionTicket,
        result: Result<super::source::BoundedImage, OverlayError>,
    ) -> Result<SelectionOutcome, OverlayError> {
        let outcome = self.session()?.commit_selection(ticket, result);
        match &outcome {
            Ok(SelectionOutcome::Applied { preview }) => log::info!("🖼️ 选图已生效 - 预览: {}", preview),
            Ok(SelectionOutcome::Superseded) => log::info!("⏭️ 选图结果已被更新的选择取代"),
            Err(err) => log::error!("❌ 选图失败（{}）：{}", err.code(), err),
        }
        outcome
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<(), OverlayError> {
        self.session()?.set_text(text);
        Ok(())
    }

    pub fn set_size(&self, size: impl Into<String>) -> Result<(), OverlayError> {
        self.session()?.set_size(size);
        Ok(())
    }

    /// 提交当前表单到处理服务。
    ///
    /// 校验失败或已有请求在途时不会发起网络请求。
    pub async fn submit(&self) -> Result<ProcessedImage, OverlayError> {
        let request = self.session()?.begin_submission()?;
        let result = self.handler.submit(&request).await;

        if let Err(err) = &result {
            log::error!("❌ 提交失败（{}）：{}", err.code(), err);
        }

        let outcome = self.session()?.finish_submission(result);
        if let Err(OverlayError::Stale) = &outcome {
            log::warn!("⏭️ 提交期间已更换图片，丢弃旧图的处理结果");
        }
        outcome
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, OverlayError> {
        Ok(self.session()?.snapshot())
    }

    /// 将预览句柄解析为 `data:` URL。
    pub fn preview_data_url(&self, handle: &str) -> Option<String> {
        self.registry.data_url(handle)
    }

    pub fn live_previews(&self) -> usize {
        self.registry.live_count()
    }

    /// 下载处理结果。
    ///
    /// `target` 为目录时使用推荐文件名。
    pub fn save_processed(&self, target: &Path) -> Result<PathBuf, OverlayError> {
        let processed = self
            .session()?
            .processed()
            .cloned()
            .ok_or_else(|| OverlayError::State("尚无处理结果可下载".to_string()))?;

        let path = if target.is_dir() {
            target.join(processed.suggested_file_name())
        } else {
            target.to_path_buf()
        };

        write_file(&path, &processed.bytes)?;
        log::info!("💾 处理结果已保存：{}", path.display());
        Ok(path)
    }

    /// 导出降采样后的 JPEG。
    pub fn save_preview(&self, target: &Path) -> Result<PathBuf, OverlayError> {
        let image = self
            .session()?
            .image()
            .cloned()
            .ok_or_else(|| OverlayError::State("尚未选择图片".to_string()))?;

        let path = if target.is_dir() {
            target.join(format!("{}-preview.jpg", file_stem(&image.name)))
        } else {
            target.to_path_buf()
        };

        write_file(&path, &image.bytes)?;
        log::info!("💾 预览图已保存：{}", path.display());
        Ok(path)
    }

    /// 设置缩放档位。
    pub fn set_resize_profile(&self, profile: &str) -> Result<(), OverlayError> {
        let profile = ResizeProfile::parse(profile)?;
        self.handler.set_resize_profile(profile)
    }

    /// 获取当前生效缩放档位（字符串）。
    pub fn get_resize_profile(&self) -> Result<String, OverlayError> {
        Ok(self.handler.get_resize_profile()?.as_str().to_string())
    }

    pub fn set_advanced_config(&self, config: OverlayAdvancedConfig) -> Result<(), OverlayError> {
        self.handler.set_advanced_config(&config)
    }

    pub fn get_advanced_config(&self) -> Result<OverlayAdvancedConfig, OverlayError> {
        self.handler.get_advanced_config()
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), OverlayError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| OverlayError::FileSystem(format!("创建目录 '{}' 失败：{}", parent.display(), e)))?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| OverlayError::FileSystem(format!("写入文件 '{}' 失败：{}", path.display(), e)))
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_string())
}
