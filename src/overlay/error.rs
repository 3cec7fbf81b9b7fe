//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“选图 → 降采样 → 提交”链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 对外的三类失败语义：
//! - `ValidationFailure`：表单输入不合法，不会发起网络请求
//! - `DownscaleFailure`：源图无法读取/解码，或重新编码失败
//! - `SubmissionFailure`：网络错误或处理服务返回非成功状态

use std::fmt;

/// 表单字段（与 multipart 字段名一一对应）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    /// 图片（multipart 字段 `file`）。
    File,
    /// 叠加文字（multipart 字段 `text`）。
    Text,
    /// 字号（multipart 字段 `size`）。
    Size,
}

impl FormField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Text => "text",
            Self::Size => "size",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误大类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FailureKind {
    ValidationFailure,
    DownscaleFailure,
    SubmissionFailure,
    SessionFailure,
}

/// 图片叠加链路统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("输入校验失败（{field}）：{message}")]
    Validation { field: FormField, message: String },

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("处理服务返回异常状态：{status}")]
    HttpStatus { status: u16 },

    #[error("处理服务响应异常：{0}")]
    MalformedResponse(String),

    #[error("已有请求正在处理中，请稍候")]
    Busy,

    #[error("提交期间已更换图片，处理结果已丢弃")]
    Stale,

    #[error("配置错误：{0}")]
    Config(String),

    #[error("状态错误：{0}")]
    State(String),
}

impl OverlayError {
    pub(crate) fn validation(field: FormField, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// 稳定错误码，供前端/脚本按码分支。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "E_VALIDATION",
            Self::Decode(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::Network(_) => "E_NETWORK",
            Self::HttpStatus { .. } => "E_HTTP_STATUS",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
            Self::Busy => "E_BUSY",
            Self::Stale => "E_STALE",
            Self::Config(_) => "E_CONFIG",
            Self::State(_) => "E_STATE",
        }
    }

    /// 出错阶段。
    pub fn stage(&self) -> &'static str {
        match self.kind() {
            FailureKind::ValidationFailure => "validation",
            FailureKind::DownscaleFailure => "downscale",
            FailureKind::SubmissionFailure => "submission",
            FailureKind::SessionFailure => "session",
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation { .. } => FailureKind::ValidationFailure,
            Self::Decode(_)
            | Self::Encode(_)
            | Self::InvalidFormat(_)
            | Self::ResourceLimit(_)
            | Self::FileSystem(_) => FailureKind::DownscaleFailure,
            Self::Network(_) | Self::HttpStatus { .. } | Self::MalformedResponse(_) => {
                FailureKind::SubmissionFailure
            }
            Self::Busy | Self::Stale | Self::Config(_) | Self::State(_) => FailureKind::SessionFailure,
        }
    }

    /// 校验失败时返回出错字段。
    pub fn invalid_field(&self) -> Option<FormField> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl From<OverlayError> for String {
    fn from(error: OverlayError) -> Self {
        error.to_string()
    }
}
