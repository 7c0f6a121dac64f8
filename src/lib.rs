//! # P3A 帧上传工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        实时图形宿主（渲染输出 / TOP）           │
//! │   SourceResolver::resolve("render_out")      │
//! └───────┬──────────────────────────────────────┘
//!         ↓ FrameBuffer (H×W×C f32, 左下原点)
//! ┌───────┼──────────────────────────────────────┐
//! │       ↓          frame_uploader              │
//! │  pipeline ── 翻转 · 量化 · 去 alpha · 720²    │
//! │  encoder  ── PNG / JPEG / WEBP               │
//! │  transport ─ multipart POST /upload/image    │
//! └───────┼──────────────────────────────────────┘
//!         ↓ HTTP/1.1
//!   P3A 显示设备（720x720）
//! ```
//!
//! 对外只有一个同步操作 [`FrameUploader::upload`]，永远返回 [`UploadResult`]，
//! 不会把错误以 panic 或 `Err` 的形式抛给宿主。

pub mod frame_uploader;

pub use frame_uploader::{
    FailureReason,
    FrameBuffer,
    FrameTransport,
    FrameUploader,
    HttpTransport,
    MemorySourceResolver,
    SourceResolver,
    UploadConfig,
    UploadError,
    UploadFormat,
    UploadResult,
};
