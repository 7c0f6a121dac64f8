//! # 帧上传模块（frame_uploader）
//!
//! ## 设计思路
//!
//! 该模块将“取帧 → 像素变换 → 编码 → HTTP 上传 → 结果解释”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `handler`：编排整条处理流水线，并把错误收敛为 `UploadResult`
//! - `pipeline`：翻转、量化、去 alpha、缩放到 720x720
//! - `encoder`：PNG / JPEG / WEBP 内存编码与签名自检
//! - `transport`：multipart 上传（可注入）
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 宿主调用 upload(...)
//!    ↓
//! handler.rs（参数解析 + 阶段耗时日志 + panic 兜底）
//!    ├─ SourceResolver（宿主提供帧快照）
//!    ├─ pipeline.rs（翻转 + 量化 + 去 alpha + Lanczos 缩放）
//!    ├─ encoder.rs（编码 + infer 签名校验）
//!    └─ transport.rs（POST /upload/image）
//!    ↓
//! 返回 UploadResult（Success / Failure）
//! ```

mod config;
mod encoder;
mod error;
mod handler;
mod pipeline;
mod source;
mod transport;

pub use config::{DEFAULT_TIMEOUT, DEVICE_EDGE, UPLOAD_FIELD, UPLOAD_PATH, UploadConfig, UploadFormat};
pub use error::{FailureReason, UploadError};
pub use handler::FrameUploader;
pub use source::{
    DeviceResponse,
    EncodedImage,
    FrameBuffer,
    MemorySourceResolver,
    PreparedFrame,
    SourceResolver,
    UploadFailure,
    UploadResult,
    UploadSuccess,
};
pub use transport::{FrameTransport, HttpTransport};
