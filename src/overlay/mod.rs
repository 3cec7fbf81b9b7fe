//! # 图片叠加模块（overlay）
//!
//! ## 设计思路
//!
//! 该模块将“选图 → 加载校验 → 解码降采样 → JPEG 编码 → 表单校验 → multipart 提交 → 结果预览”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：承载可注入状态（`OverlayServiceState`），展示层唯一入口
//! - `session`：表单会话状态（选图代数、加载标志、预览句柄）
//! - `handler`：编排选图与提交两条链路
//! - `loader`：负责本地文件加载与签名校验
//! - `pipeline`：负责解码、像素限制、两步夹取降采样、JPEG 编码
//! - `submit`：负责表单校验与 multipart 请求
//! - `preview`：负责预览句柄注册与释放
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 展示层（CLI / UI）
//!    ↓
//! service.rs（会话锁 + 服务入口）
//!    ├─ session.rs（凭证/加载标志/预览句柄）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（文件加载 + 体积/签名校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 降采样 + 编码）
//!    └─ submit.rs（表单校验 + multipart POST）
//!    ↓
//! 返回 OverlayError 给展示层
//! ```
//!
//! ## 分层职责建议
//!
//! - 配置与策略变更优先改 `config.rs`
//! - 会话规则（何时可提交、何时丢弃结果）优先改 `session.rs`
//! - 单阶段行为优化分别改 `loader/pipeline/submit`

mod config;
mod error;
mod handler;
mod loader;
mod pipeline;
mod preview;
mod service;
mod session;
mod source;
mod submit;

pub use config::{OverlayConfig, ResizeProfile};
pub use error::{FailureKind, FormField, OverlayError};
pub use handler::OverlayHandler;
pub use pipeline::bounded_dimensions;
pub use preview::{PreviewGuard, PreviewRegistry};
pub use service::{OverlayAdvancedConfig, OverlayServiceState};
pub use session::{
    FormSession, ImageSummary, ProcessedSummary, SelectionOutcome, SelectionTicket, SessionSnapshot,
};
pub use source::{BoundedImage, OverlayRequest, ProcessedImage, SourceImage};
pub use submit::{FIELD_FILE, FIELD_SIZE, FIELD_TEXT, build_request, parse_font_size};
