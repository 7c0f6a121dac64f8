//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“宿主输入”“流水线中间结果”“最终结果”解耦：
//! - `FrameBuffer` + `SourceResolver` 表示宿主渲染缓冲及其解析能力
//! - `PreparedFrame` 表示已翻转、量化、去 alpha、缩放后的 RGB 图像
//! - `EncodedImage` 表示可直接放入 multipart 的编码字节
//! - `UploadResult` 表示单次调用的最终结局（成功 / 失败）

use std::collections::HashMap;
use std::sync::RwLock;

use image::RgbImage;
use ndarray::Array3;
use serde::Serialize;

use super::config::UploadFormat;
use super::error::{FailureReason, UploadError};

/// 宿主渲染缓冲。
///
/// 形状为 `(height, width, channels)`，原点在左下角，采样值为 `[0.0, 1.0]` 浮点。
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pixels: Array3<f32>,
}

impl FrameBuffer {
    pub fn new(pixels: Array3<f32>) -> Self {
        Self { pixels }
    }

    /// 由扁平采样数组构建（行优先，最后一维为通道）。
    pub fn from_shape_vec(
        height: usize,
        width: usize,
        channels: usize,
        samples: Vec<f32>,
    ) -> Result<Self, UploadError> {
        let pixels = Array3::from_shape_vec((height, width, channels), samples).map_err(|e| {
            UploadError::Encoding(format!(
                "帧缓冲形状不匹配（{}x{}x{}）：{}",
                height, width, channels, e
            ))
        })?;

        Ok(Self { pixels })
    }

    /// 所有采样取同一值的缓冲，主要用于宿主占位帧与测试。
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Self {
        Self {
            pixels: Array3::from_elem((height, width, channels), value),
        }
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.pixels.shape()[2]
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &Array3<f32> {
        &self.pixels
    }
}

/// 宿主侧的帧解析能力。
///
/// 每次调用返回一份独立快照，上传器不会在调用结束后持有它。
pub trait SourceResolver {
    fn resolve(&self, source_ref: &str) -> Option<FrameBuffer>;
}

impl<F> SourceResolver for F
where
    F: Fn(&str) -> Option<FrameBuffer>,
{
    fn resolve(&self, source_ref: &str) -> Option<FrameBuffer> {
        self(source_ref)
    }
}

/// 以名称索引的内存帧快照表。
///
/// 适合宿主主动推送帧（而非被动查询）的接入方式。
#[derive(Debug, Default)]
pub struct MemorySourceResolver {
    frames: RwLock<HashMap<String, FrameBuffer>>,
}

impl MemorySourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或替换指定名称的帧，返回旧帧。
    pub fn insert(&self, source_ref: impl Into<String>, frame: FrameBuffer) -> Option<FrameBuffer> {
        match self.frames.write() {
            Ok(mut frames) => frames.insert(source_ref.into(), frame),
            Err(_) => {
                log::warn!("⚠️ 帧快照表写锁已中毒，忽略写入");
                None
            }
        }
    }

    pub fn remove(&self, source_ref: &str) -> Option<FrameBuffer> {
        self.frames.write().ok()?.remove(source_ref)
    }
}

impl SourceResolver for MemorySourceResolver {
    fn resolve(&self, source_ref: &str) -> Option<FrameBuffer> {
        self.frames.read().ok()?.get(source_ref).cloned()
    }
}

/// 变换阶段输出：可直接编码的 RGB 图像。
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    /// 顶左原点、三通道、8 位的图像。
    pub image: RgbImage,
    /// 原始缓冲宽度（用于诊断日志）。
    pub source_width: usize,
    /// 原始缓冲高度（用于诊断日志）。
    pub source_height: usize,
    /// 是否经过重采样。
    pub resized: bool,
}

/// 编码阶段输出。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: UploadFormat,
    pub content_type: &'static str,
    pub file_name: &'static str,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 设备应答（状态码 + 原始文本）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    pub status: u16,
    pub body: String,
}

impl DeviceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSuccess {
    /// 设备返回的 JSON 应答。
    pub response: serde_json::Value,
    pub url: String,
    pub bytes_sent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub reason: FailureReason,
    pub stage: &'static str,
    /// 仅设备拒绝时存在。
    pub status_code: Option<u16>,
    pub message: String,
}

impl From<UploadError> for UploadFailure {
    fn from(error: UploadError) -> Self {
        Self {
            reason: error.reason(),
            stage: error.stage(),
            status_code: error.status_code(),
            message: match &error {
                UploadError::Server { body, .. } => body.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// 单次上传的最终结局。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadResult {
    Success(UploadSuccess),
    Failure(UploadFailure),
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.reason),
        }
    }
}

impl From<Result<UploadSuccess, UploadError>> for UploadResult {
    fn from(result: Result<UploadSuccess, UploadError>) -> Self {
        match result {
            Ok(success) => Self::Success(success),
            Err(error) => Self::Failure(error.into()),
        }
    }
}
