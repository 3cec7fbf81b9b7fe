//! # 图片文字叠加编辑器 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                展示层（CLI / 任意 UI）                    │
//! │   选图 ── 文字 ── 字号 ── 提交 ── 预览 ── 下载            │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ settings ─── 环境变量 / JSON 设置文件                  │
//! │  │                                                       │
//! │  └─ overlay ──── 会话 + 降采样 + 提交                      │
//! │      ├─ pipeline      解码·两步夹取·JPEG 编码             │
//! │      ├─ submit        表单校验·multipart POST             │
//! │      └─ preview       预览句柄 (RAII 释放)                │
//! └──────────────────────────────────────────────────────────┘
//!         ↕ multipart/form-data: file / text / size
//!      外部图片处理服务
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`settings`] | 处理服务地址与调优常量的加载、合并、校验 |
//! | [`overlay`] | 选图降采样、表单会话、提交处理服务、预览与下载 |

pub mod error;
pub mod overlay;
pub mod settings;
