//! # 配置模块
//!
//! ## 设计思路
//!
//! 调用点参数（来源、设备地址、格式、质量）与固定策略（超时、目标尺寸、滤镜）
//! 集中到 `UploadConfig`，由调用方显式传入，不保留任何模块级全局状态。
//!
//! ## 实现思路
//!
//! - `Default` 给出与设备默认接入方式一致的取值。
//! - `UploadFormat::from_str` 负责格式字符串解析（大小写不敏感）。
//! - `normalized` 在进入流水线前收敛越界参数（如质量 > 100）。

use std::time::Duration;

use image::imageops::FilterType;
use serde::Serialize;

use super::UploadError;

/// P3A 设备原生分辨率（正方形边长）。
pub const DEVICE_EDGE: u32 = 720;

/// 设备接收图片的 HTTP 路径。
pub const UPLOAD_PATH: &str = "/upload/image";

/// multipart 中承载图片的字段名。
pub const UPLOAD_FIELD: &str = "image";

/// 单次请求的默认超时。
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// 上传编码格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadFormat {
    Png,
    Jpeg,
    Webp,
}

impl UploadFormat {
    /// 从外部字符串解析格式。
    ///
    /// # 示例
    /// ```rust
    /// use p3a_frame_uploader::UploadFormat;
    ///
    /// let f = UploadFormat::from_str("webp")?;
    /// assert_eq!(f, UploadFormat::Webp);
    /// # Ok::<(), p3a_frame_uploader::UploadError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(format: &str) -> Result<Self, UploadError> {
        match format.trim().to_ascii_uppercase().as_str() {
            "PNG" => Ok(Self::Png),
            "JPEG" | "JPG" => Ok(Self::Jpeg),
            "WEBP" => Ok(Self::Webp),
            _ => Err(UploadError::UnsupportedFormat(format.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WEBP",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Png => "td_frame.png",
            Self::Jpeg => "td_frame.jpg",
            Self::Webp => "td_frame.webp",
        }
    }

    /// 质量参数是否对该格式生效（PNG 忽略质量）。
    pub fn uses_quality(self) -> bool {
        !matches!(self, Self::Png)
    }
}

impl std::fmt::Display for UploadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次上传的完整配置。
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// 交给 `SourceResolver` 解析的帧来源标识。
    pub source_ref: String,
    /// 设备主机名或 IP（可带端口）。
    pub target_address: String,
    /// 编码格式。
    pub format: UploadFormat,
    /// JPEG / WEBP 质量（0~100）。
    pub quality: u8,
    /// 整个 HTTP 请求的超时时间。
    pub timeout: Duration,
    /// 重采样滤镜。
    pub resize_filter: FilterType,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_ref: "render_out".to_string(),
            target_address: "p3a.local".to_string(),
            format: UploadFormat::Jpeg,
            quality: 75,
            timeout: DEFAULT_TIMEOUT,
            resize_filter: FilterType::Lanczos3,
        }
    }
}

impl UploadConfig {
    /// 设备上传地址。
    pub fn upload_url(&self) -> String {
        format!("http://{}{}", self.target_address.trim(), UPLOAD_PATH)
    }

    /// 收敛越界参数后的配置副本。
    pub(crate) fn normalized(&self) -> Self {
        let mut config = self.clone();

        if config.quality > 100 {
            log::warn!("⚠️ 质量参数越界：{}，按 100 处理", config.quality);
            config.quality = 100;
        }

        if config.timeout.is_zero() {
            log::warn!("⚠️ 超时时间为 0，回退默认 {:?}", DEFAULT_TIMEOUT);
            config.timeout = DEFAULT_TIMEOUT;
        }

        config
    }
}
