//! # 像素变换流水线模块
//!
//! ## 设计思路
//!
//! 将“宿主浮点缓冲 → 设备可用 RGB 图像”的过程集中管理。
//! 宿主缓冲原点在左下角，设备与所有图片容器都以左上角为原点，
//! 因此必须先翻转，再量化到 8 位。
//!
//! ## 实现思路
//!
//! 1. 校验通道数（仅 3 / 4）
//! 2. 垂直翻转 + 钳制量化 + 丢弃 alpha（单次遍历完成）
//! 3. 尺寸不是 720x720 时用 Lanczos 类滤镜重采样

use fast_image_resize as fr;
use image::RgbImage;
use image::imageops::FilterType;
use ndarray::s;

use super::config::DEVICE_EDGE;
use super::source::{FrameBuffer, PreparedFrame};
use super::{FrameUploader, UploadConfig, UploadError};

/// 浮点采样量化为 8 位。
///
/// 先钳制到 `[0.0, 1.0]` 再乘 255 截断；NaN 视为 0。
pub(crate) fn quantize_sample(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

impl FrameUploader {
    /// 将宿主缓冲转换为可直接编码的 720x720 RGB 图像。
    pub(crate) fn prepare_frame(
        frame: &FrameBuffer,
        config: &UploadConfig,
    ) -> Result<PreparedFrame, UploadError> {
        let (source_width, source_height) = (frame.width(), frame.height());

        if frame.is_empty() {
            return Err(UploadError::EmptyBuffer(format!(
                "{} 没有图像数据（{}x{}x{}）",
                config.source_ref,
                source_width,
                source_height,
                frame.channels()
            )));
        }

        let image = Self::to_top_left_rgb8(frame)?;

        let resized = image.dimensions() != (DEVICE_EDGE, DEVICE_EDGE);
        let image = if resized {
            let resized_image =
                Self::resize_to_device(image, DEVICE_EDGE, DEVICE_EDGE, config.resize_filter)?;
            log::info!(
                "🧩 已缩放 {}x{} -> {}x{}（filter={:?}）",
                source_width,
                source_height,
                DEVICE_EDGE,
                DEVICE_EDGE,
                config.resize_filter
            );
            resized_image
        } else {
            image
        };

        Ok(PreparedFrame {
            image,
            source_width,
            source_height,
            resized,
        })
    }

    /// 翻转为左上原点、量化为 8 位并丢弃 alpha。
    fn to_top_left_rgb8(frame: &FrameBuffer) -> Result<RgbImage, UploadError> {
        let channels = frame.channels();
        if channels != 3 && channels != 4 {
            return Err(UploadError::Encoding(format!(
                "不支持的通道数：{}（仅支持 RGB / RGBA）",
                channels
            )));
        }

        let width = u32::try_from(frame.width())
            .map_err(|_| UploadError::Encoding(format!("帧宽度过大：{}", frame.width())))?;
        let height = u32::try_from(frame.height())
            .map_err(|_| UploadError::Encoding(format!("帧高度过大：{}", frame.height())))?;

        let capacity = frame
            .width()
            .checked_mul(frame.height())
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| UploadError::Encoding("帧尺寸导致内存溢出风险".to_string()))?;

        let flipped = frame.pixels().slice(s![..;-1, .., ..]);
        let mut bytes = Vec::with_capacity(capacity);
        for row in flipped.outer_iter() {
            for pixel in row.outer_iter() {
                bytes.extend(pixel.iter().take(3).map(|&value| quantize_sample(value)));
            }
        }

        RgbImage::from_raw(width, height, bytes)
            .ok_or_else(|| UploadError::Encoding("量化后像素数据长度异常".to_string()))
    }

    fn resize_to_device(
        image: RgbImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbImage, UploadError> {
        match Self::resize_with_fast_image_resize(&image, target_width, target_height, filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::resize：{}", err);
                Ok(image::imageops::resize(
                    &image,
                    target_width,
                    target_height,
                    filter,
                ))
            }
        }
    }

    fn resize_with_fast_image_resize(
        image: &RgbImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbImage, UploadError> {
        let (src_width, src_height) = image.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            image.as_raw().clone(),
            fr::PixelType::U8x3,
        )
        .map_err(|e| UploadError::Encoding(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x3);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| UploadError::Encoding(format!("fast_image_resize 执行失败：{}", e)))?;

        RgbImage::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| UploadError::Encoding("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}
