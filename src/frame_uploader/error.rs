//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载上传链路中的所有失败来源，避免字符串拼接式错误处理。
//! 每个分支对应一个稳定的失败原因标签（`FailureReason`），调用侧既可按分支匹配，
//! 也可以直接读取 `code()` / `stage()` 做日志聚合。

use serde::Serialize;

/// 失败原因标签。
///
/// 与 `UploadError` 的分支一一对应，序列化后为稳定字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    SourceNotFound,
    EmptyBuffer,
    UnsupportedFormat,
    EncodingError,
    NetworkError,
    ServerError,
    UnexpectedError,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceNotFound => "source_not_found",
            Self::EmptyBuffer => "empty_buffer",
            Self::UnsupportedFormat => "unsupported_format",
            Self::EncodingError => "encoding_error",
            Self::NetworkError => "network_error",
            Self::ServerError => "server_error",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

/// 帧上传统一错误类型。
///
/// 只在 `FrameUploader::upload*` 边界被转换为 `UploadResult::Failure`，
/// 内部各阶段一律通过 `Result<T, UploadError>` + `?` 传播。
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("帧来源不存在：{0}")]
    SourceNotFound(String),

    #[error("帧缓冲为空：{0}")]
    EmptyBuffer(String),

    #[error("不支持的图片格式：{0}（可选：PNG / JPEG / WEBP）")]
    UnsupportedFormat(String),

    #[error("编码错误：{0}")]
    Encoding(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("设备返回 HTTP {status}：{body}")]
    Server { status: u16, body: String },

    /// 其余未归类的故障，保留原始类型名与消息。
    #[error("意外错误：{kind}: {message}")]
    Unexpected { kind: String, message: String },
}

impl UploadError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::SourceNotFound(_) => FailureReason::SourceNotFound,
            Self::EmptyBuffer(_) => FailureReason::EmptyBuffer,
            Self::UnsupportedFormat(_) => FailureReason::UnsupportedFormat,
            Self::Encoding(_) => FailureReason::EncodingError,
            Self::Network(_) => FailureReason::NetworkError,
            Self::Server { .. } => FailureReason::ServerError,
            Self::Unexpected { .. } => FailureReason::UnexpectedError,
        }
    }

    /// 稳定的错误码，便于日志检索。
    pub fn code(&self) -> &'static str {
        self.reason().as_str()
    }

    /// 出错所在的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) | Self::EmptyBuffer(_) => "resolve",
            Self::UnsupportedFormat(_) => "config",
            Self::Encoding(_) => "encode",
            Self::Network(_) => "upload",
            Self::Server { .. } => "response",
            Self::Unexpected { .. } => "unknown",
        }
    }

    /// HTTP 状态码（仅 `Server` 分支携带）。
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 将任意错误值包装为 `Unexpected`，保留其具体类型名。
    pub(crate) fn unexpected<E: std::fmt::Display>(error: E) -> Self {
        Self::Unexpected {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
        }
    }
}
