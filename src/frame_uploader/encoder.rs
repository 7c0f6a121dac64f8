//! # 编码模块
//!
//! ## 设计思路
//!
//! 把 `PreparedFrame` 编码为内存中的 PNG / JPEG / WEBP 字节，并附带
//! 与格式一致的 content-type 与文件名。编码完成后用 `infer` 校验文件签名，
//! 防止编码器静默产出与声明类型不符的数据。

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use super::config::UploadFormat;
use super::source::{EncodedImage, PreparedFrame};
use super::{FrameUploader, UploadError};

const ENCODE_BUFFER_INITIAL_CAPACITY: usize = 256 * 1024;

impl FrameUploader {
    /// 按格式编码图像。`quality` 仅对 JPEG / WEBP 生效。
    pub(crate) fn encode_frame(
        prepared: &PreparedFrame,
        format: UploadFormat,
        quality: u8,
    ) -> Result<EncodedImage, UploadError> {
        let image = &prepared.image;
        let bytes = match format {
            UploadFormat::Png => Self::encode_png(image)?,
            UploadFormat::Jpeg => Self::encode_jpeg(image, quality)?,
            UploadFormat::Webp => Self::encode_webp(image, quality)?,
        };

        Self::validate_encoded_signature(&bytes, format)?;

        Ok(EncodedImage {
            bytes,
            format,
            content_type: format.content_type(),
            file_name: format.file_name(),
        })
    }

    /// 固定中等压缩级别。
    fn encode_png(image: &RgbImage) -> Result<Vec<u8>, UploadError> {
        let mut buffer = Vec::with_capacity(ENCODE_BUFFER_INITIAL_CAPACITY);
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            CompressionType::Default,
            PngFilterType::Adaptive,
        );

        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| UploadError::Encoding(format!("PNG 编码失败：{}", e)))?;

        Ok(buffer)
    }

    #[cfg(not(feature = "mozjpeg"))]
    fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, UploadError> {
        log::trace!("使用 image crate 编码 JPEG");
        let mut buffer = Vec::with_capacity(ENCODE_BUFFER_INITIAL_CAPACITY);
        {
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut buffer,
                quality.clamp(1, 100),
            );

            encoder
                .encode_image(image)
                .map_err(|e| UploadError::Encoding(format!("JPEG 编码失败：{}", e)))?;
        }

        Ok(buffer)
    }

    /// mozjpeg 路径：开启 Huffman 表优化（熵编码优化）。
    #[cfg(feature = "mozjpeg")]
    fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, UploadError> {
        log::trace!("使用 mozjpeg 编码 JPEG");
        let (width, height) = (image.width() as usize, image.height() as usize);
        let pixels = image.as_raw();

        // libjpeg 的致命错误以 panic 形式抛出
        std::panic::catch_unwind(|| -> std::io::Result<Vec<u8>> {
            let mut compress = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            compress.set_size(width, height);
            compress.set_quality(f32::from(quality.clamp(1, 100)));
            compress.set_optimize_coding(true);

            let mut started = compress.start_compress(Vec::with_capacity(ENCODE_BUFFER_INITIAL_CAPACITY))?;
            started.write_scanlines(pixels)?;
            started.finish()
        })
        .map_err(|_| UploadError::Encoding("mozjpeg 编码过程异常中止".to_string()))?
        .map_err(|e| UploadError::Encoding(format!("JPEG 编码失败：{}", e)))
    }

    fn encode_webp(image: &RgbImage, quality: u8) -> Result<Vec<u8>, UploadError> {
        let encoder = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height());
        let memory = encoder
            .encode_simple(false, f32::from(quality.min(100)))
            .map_err(|e| UploadError::Encoding(format!("WEBP 编码失败：{:?}", e)))?;

        Ok(memory.to_vec())
    }

    fn validate_encoded_signature(bytes: &[u8], format: UploadFormat) -> Result<(), UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Encoding("编码结果为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| UploadError::Encoding("无法识别编码结果的文件签名".to_string()))?;

        if kind.mime_type() != format.content_type() {
            return Err(UploadError::Encoding(format!(
                "编码结果签名不符：期望 {}，实际 {}",
                format.content_type(),
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
