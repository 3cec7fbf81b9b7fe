//! # 预览句柄模块
//!
//! ## 设计思路
//!
//! 预览句柄是对内存中图片字节的“本地引用”，展示层可凭句柄直接取到可渲染的数据，
//! 无需再走网络。句柄只是派生引用，不拥有数据，来源被替换时必须释放，
//! 否则反复选图/提交会让注册表无限增长。
//!
//! ## 实现思路
//!
//! - `PreviewRegistry`：`Arc<Mutex<HashMap>>` 保存句柄 → 字节，可在会话间共享。
//! - `PreviewGuard` 采用 RAII 模式：注册时创建，`Drop` 时自动从注册表移除。
//! - 句柄格式为 `blob:overlay/<id>`，`data_url` 将字节编码为 `data:` URL 供展示。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

use super::OverlayError;

const HANDLE_PREFIX: &str = "blob:overlay/";

struct PreviewEntry {
    bytes: Bytes,
    media_type: String,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, PreviewEntry>>,
}

/// 预览句柄注册表。
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一段图片字节，返回持有句柄的守卫。
    pub fn register(&self, bytes: Bytes, media_type: impl Into<String>) -> Result<PreviewGuard, OverlayError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| OverlayError::State("预览注册表锁已中毒".to_string()))?;
        entries.insert(
            id,
            PreviewEntry {
                bytes,
                media_type: media_type.into(),
            },
        );

        log::debug!("🖼️ 已注册预览句柄 {}{}（当前 {} 个）", HANDLE_PREFIX, id, entries.len());

        Ok(PreviewGuard {
            id,
            registry: self.clone(),
        })
    }

    /// 按句柄解析为 `data:` URL，句柄已释放时返回 `None`。
    pub fn data_url(&self, handle: &str) -> Option<String> {
        let id = parse_handle(handle)?;
        let entries = self.inner.entries.lock().ok()?;
        entries.get(&id).map(|entry| {
            format!(
                "data:{};base64,{}",
                entry.media_type,
                general_purpose::STANDARD.encode(&entry.bytes)
            )
        })
    }

    /// 按句柄取回原始字节。
    pub fn bytes(&self, handle: &str) -> Option<Bytes> {
        let id = parse_handle(handle)?;
        let entries = self.inner.entries.lock().ok()?;
        entries.get(&id).map(|entry| entry.bytes.clone())
    }

    /// 当前存活句柄数量。
    pub fn live_count(&self) -> usize {
        self.inner.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    fn release(&self, id: u64) {
        match self.inner.entries.lock() {
            Ok(mut entries) => {
                if entries.remove(&id).is_some() {
                    log::debug!("🧹 已释放预览句柄 {}{}", HANDLE_PREFIX, id);
                }
            }
            Err(_) => log::warn!("⚠️ 预览注册表锁已中毒，句柄 {}{} 未能释放", HANDLE_PREFIX, id),
        }
    }
}

fn parse_handle(handle: &str) -> Option<u64> {
    handle.strip_prefix(HANDLE_PREFIX)?.parse().ok()
}

/// 预览句柄的 RAII 守卫。
///
/// 守卫离开作用域（或被新的守卫替换）时，注册表中的条目随之释放。
pub struct PreviewGuard {
    id: u64,
    registry: PreviewRegistry,
}

impl PreviewGuard {
    pub fn handle(&self) -> String {
        format!("{}{}", HANDLE_PREFIX, self.id)
    }
}

impl std::fmt::Debug for PreviewGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreviewGuard").field(&self.handle()).finish()
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
