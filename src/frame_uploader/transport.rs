//! # 传输模块
//!
//! ## 设计思路
//!
//! 上传动作抽象为 `FrameTransport`，生产环境使用基于 `reqwest::blocking` 的
//! `HttpTransport`，测试可注入计数 / 模拟实现，无需真实设备。
//!
//! ## 实现思路
//!
//! - 每次调用单独构建客户端，连接随调用结束释放。
//! - 设备位于局域网，忽略系统代理。
//! - 请求体为 multipart/form-data，仅一个名为 `image` 的文件字段。
//! - 传输层只负责拿到“状态码 + 原始文本”，是否成功由编排层判断。

use std::time::Duration;

use reqwest::blocking::{Client, multipart};

use super::config::UPLOAD_FIELD;
use super::source::{DeviceResponse, EncodedImage};
use super::UploadError;

/// 向设备投递编码后图片的能力。
pub trait FrameTransport {
    fn post_image(
        &self,
        url: &str,
        image: &EncodedImage,
        timeout: Duration,
    ) -> Result<DeviceResponse, UploadError>;
}

/// 基于 HTTP/1.1 multipart 的默认传输。
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    fn build_client(timeout: Duration) -> Result<Client, UploadError> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| UploadError::Network(format!("无法创建 HTTP 客户端：{}", e)))
    }

    fn build_form(image: &EncodedImage) -> Result<multipart::Form, UploadError> {
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name)
            .mime_str(image.content_type)
            .map_err(|e| UploadError::Encoding(format!("无效的 content-type：{}", e)))?;

        Ok(multipart::Form::new().part(UPLOAD_FIELD, part))
    }

    fn map_reqwest_error(err: reqwest::Error, url: &str) -> UploadError {
        if err.is_timeout() {
            UploadError::Network(format!("请求超时：{}", url))
        } else if err.is_connect() {
            UploadError::Network(format!("无法连接设备 {}：{}", url, err))
        } else if err.is_builder() {
            UploadError::Network(format!("设备地址无效 {}：{}", url, err))
        } else {
            UploadError::Network(format!("请求失败 {}：{}", url, err))
        }
    }
}

impl FrameTransport for HttpTransport {
    fn post_image(
        &self,
        url: &str,
        image: &EncodedImage,
        timeout: Duration,
    ) -> Result<DeviceResponse, UploadError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| UploadError::Network(format!("设备地址无效 {}：{}", url, e)))?;

        let client = Self::build_client(timeout)?;
        let form = Self::build_form(image)?;

        log::debug!("📡 发送 multipart 请求 - {} bytes -> {}", image.len(), parsed);

        let response = client
            .post(parsed)
            .multipart(form)
            .send()
            .map_err(|e| Self::map_reqwest_error(e, url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Self::map_reqwest_error(e, url))?;

        Ok(DeviceResponse { status, body })
    }
}
