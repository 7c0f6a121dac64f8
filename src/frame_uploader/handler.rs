//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `FrameUploader` 只负责流程编排，处理链路固定为：
//! 1. 解析格式与参数（任何网络活动之前）
//! 2. 通过 `SourceResolver` 取得帧快照
//! 3. 变换为 720x720 RGB
//! 4. 编码
//! 5. 通过 `FrameTransport` 上传并解释应答
//!
//! ## 实现思路
//!
//! - 内部各阶段返回 `Result<_, UploadError>`，只在 `upload*` 边界收敛为 `UploadResult`。
//! - 宿主回调或编码库中的 panic 被捕获为 `UnexpectedError`，调用方永远拿到结果值。
//! - 记录 `resolve/transform/encode/upload/total` 阶段耗时，便于性能诊断。

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use super::source::{DeviceResponse, UploadSuccess};
use super::transport::{FrameTransport, HttpTransport};
use super::{SourceResolver, UploadConfig, UploadError, UploadFormat, UploadResult};

/// 帧上传器。
///
/// 持有宿主帧解析能力与传输实现，本身不保存任何跨调用状态。
pub struct FrameUploader {
    resolver: Box<dyn SourceResolver + Send + Sync>,
    transport: Box<dyn FrameTransport + Send + Sync>,
    base_config: UploadConfig,
}

impl FrameUploader {
    /// 使用默认 HTTP 传输创建上传器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use p3a_frame_uploader::{FrameBuffer, FrameUploader};
    ///
    /// let uploader = FrameUploader::new(|_: &str| Some(FrameBuffer::filled(720, 720, 4, 1.0)));
    /// let result = uploader.upload("render_out", "p3a.local", "JPEG", 75);
    /// println!("{}", result.is_success());
    /// ```
    pub fn new<R>(resolver: R) -> Self
    where
        R: SourceResolver + Send + Sync + 'static,
    {
        Self::with_transport(resolver, HttpTransport::new())
    }

    /// 注入自定义传输（测试或代理场景）。
    pub fn with_transport<R, T>(resolver: R, transport: T) -> Self
    where
        R: SourceResolver + Send + Sync + 'static,
        T: FrameTransport + Send + Sync + 'static,
    {
        Self {
            resolver: Box::new(resolver),
            transport: Box::new(transport),
            base_config: UploadConfig::default(),
        }
    }

    /// 替换基础配置（超时、滤镜等不随调用点变化的参数）。
    pub fn with_config(mut self, config: UploadConfig) -> Self {
        self.base_config = config;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.base_config
    }

    /// 上传主入口：按调用点参数上传一帧。
    ///
    /// `format` 大小写不敏感；`quality` 仅对 JPEG / WEBP 生效，超过 100 按 100 处理。
    pub fn upload(
        &self,
        source_ref: &str,
        target_address: &str,
        format: &str,
        quality: u32,
    ) -> UploadResult {
        let format = match UploadFormat::from_str(format) {
            Ok(format) => format,
            Err(err) => return Self::into_result(Err(err)),
        };

        let config = UploadConfig {
            source_ref: source_ref.to_string(),
            target_address: target_address.to_string(),
            format,
            quality: u8::try_from(quality).unwrap_or(u8::MAX),
            ..self.base_config.clone()
        };

        self.upload_with_config(&config)
    }

    /// 按完整配置上传一帧。
    pub fn upload_with_config(&self, config: &UploadConfig) -> UploadResult {
        let config = config.normalized();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_pipeline(&config)))
            .unwrap_or_else(|payload| Err(Self::panic_to_error(payload)));

        Self::into_result(outcome)
    }

    fn run_pipeline(&self, config: &UploadConfig) -> Result<UploadSuccess, UploadError> {
        let total_start = Instant::now();

        let resolve_start = Instant::now();
        let frame = self
            .resolver
            .resolve(&config.source_ref)
            .ok_or_else(|| UploadError::SourceNotFound(config.source_ref.clone()))?;
        let resolve_elapsed = resolve_start.elapsed();

        let transform_start = Instant::now();
        let prepared = Self::prepare_frame(&frame, config)?;
        drop(frame);
        let transform_elapsed = transform_start.elapsed();

        let encode_start = Instant::now();
        let encoded = Self::encode_frame(&prepared, config.format, config.quality)?;
        drop(prepared);
        let encode_elapsed = encode_start.elapsed();

        let url = config.upload_url();
        log::info!(
            "🌐 上传 {} bytes（{}）到 {}...",
            encoded.len(),
            config.format,
            url
        );

        let upload_start = Instant::now();
        let response = self.transport.post_image(&url, &encoded, config.timeout)?;
        let upload_elapsed = upload_start.elapsed();

        let parsed = Self::interpret_response(response)?;

        log::info!(
            "✅ 上传成功 - resolve={}ms transform={}ms encode={}ms upload={}ms total={}ms 应答: {}",
            resolve_elapsed.as_millis(),
            transform_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            upload_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            parsed
        );

        Ok(UploadSuccess {
            response: parsed,
            url,
            bytes_sent: encoded.len(),
        })
    }

    /// 2xx 解析 JSON 应答；其余状态原样带回状态码与文本。
    fn interpret_response(response: DeviceResponse) -> Result<serde_json::Value, UploadError> {
        if !response.is_success() {
            return Err(UploadError::Server {
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str(&response.body).map_err(UploadError::unexpected)
    }

    fn panic_to_error(payload: Box<dyn Any + Send>) -> UploadError {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());

        UploadError::Unexpected {
            kind: "panic".to_string(),
            message,
        }
    }

    fn into_result(outcome: Result<UploadSuccess, UploadError>) -> UploadResult {
        if let Err(err) = &outcome {
            log::error!(
                "❌ 上传失败 - code={} stage={}：{}",
                err.code(),
                err.stage(),
                err
            );
        }

        UploadResult::from(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_uploader::source::{EncodedImage, UploadFailure};
    use crate::frame_uploader::{FailureReason, FrameBuffer, MemorySourceResolver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct SeenRequest {
        url: String,
        content_type: &'static str,
        file_name: &'static str,
        len: usize,
        timeout: Duration,
    }

    #[derive(Clone)]
    struct MockTransport {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<SeenRequest>>>,
        reply: Result<DeviceResponse, String>,
    }

    impl MockTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
                reply: Ok(DeviceResponse {
                    status,
                    body: body.to_string(),
                }),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                ..Self::replying(200, "")
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FrameTransport for MockTransport {
        fn post_image(
            &self,
            url: &str,
            image: &EncodedImage,
            timeout: Duration,
        ) -> Result<DeviceResponse, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(SeenRequest {
                url: url.to_string(),
                content_type: image.content_type,
                file_name: image.file_name,
                len: image.len(),
                timeout,
            });
            self.reply.clone().map_err(UploadError::Network)
        }
    }

    fn resolver_with(name: &str, frame: FrameBuffer) -> MemorySourceResolver {
        let resolver = MemorySourceResolver::new();
        resolver.insert(name, frame);
        resolver
    }

    fn failure_of(result: UploadResult) -> UploadFailure {
        match result {
            UploadResult::Failure(failure) => failure,
            UploadResult::Success(success) => panic!("expected failure, got {success:?}"),
        }
    }

    #[test]
    fn unsupported_format_never_touches_network() {
        let transport = MockTransport::replying(200, r#"{"status":"ok"}"#);
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(8, 8, 4, 1.0)),
            transport.clone(),
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "XYZ", 80));

        assert_eq!(failure.reason, FailureReason::UnsupportedFormat);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn missing_source_is_reported() {
        let transport = MockTransport::replying(200, "{}");
        let uploader = FrameUploader::with_transport(MemorySourceResolver::new(), transport.clone());

        let failure = failure_of(uploader.upload("nope", "p3a.local", "PNG", 0));

        assert_eq!(failure.reason, FailureReason::SourceNotFound);
        assert!(failure.message.contains("nope"));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn empty_buffer_fails_before_encoding() {
        let transport = MockTransport::replying(200, "{}");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(0, 720, 4, 1.0)),
            transport.clone(),
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "JPEG", 80));

        assert_eq!(failure.reason, FailureReason::EmptyBuffer);
        assert_eq!(failure.stage, "resolve");
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn ok_response_yields_parsed_body() {
        let transport = MockTransport::replying(200, r#"{"status":"ok"}"#);
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(360, 360, 4, 1.0)),
            transport.clone(),
        );

        let result = uploader.upload("render_out", "192.168.1.50", "jpeg", 80);

        match result {
            UploadResult::Success(success) => {
                assert_eq!(success.response, serde_json::json!({"status": "ok"}));
                assert_eq!(success.url, "http://192.168.1.50/upload/image");
                assert!(success.bytes_sent > 0);
            }
            UploadResult::Failure(failure) => panic!("expected success, got {failure:?}"),
        }

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "http://192.168.1.50/upload/image");
        assert_eq!(seen[0].content_type, "image/jpeg");
        assert_eq!(seen[0].file_name, "td_frame.jpg");
        assert_eq!(seen[0].timeout, Duration::from_secs(5));
        assert!(seen[0].len > 0);
    }

    #[test]
    fn server_error_carries_status_and_text() {
        let transport = MockTransport::replying(500, "internal failure");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(16, 16, 3, 0.2)),
            transport,
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "PNG", 0));

        assert_eq!(failure.reason, FailureReason::ServerError);
        assert_eq!(failure.status_code, Some(500));
        assert_eq!(failure.message, "internal failure");
    }

    #[test]
    fn non_json_success_body_is_unexpected() {
        let transport = MockTransport::replying(200, "OK");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(16, 16, 3, 0.2)),
            transport,
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "WEBP", 70));

        assert_eq!(failure.reason, FailureReason::UnexpectedError);
        assert!(failure.message.contains("serde_json"));
    }

    #[test]
    fn network_failure_is_reported() {
        let transport = MockTransport::failing("connection refused");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(16, 16, 3, 0.2)),
            transport.clone(),
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "PNG", 0));

        assert_eq!(failure.reason, FailureReason::NetworkError);
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn resolver_panic_becomes_unexpected_error() {
        let transport = MockTransport::replying(200, "{}");
        let uploader = FrameUploader::with_transport(
            |_: &str| -> Option<FrameBuffer> { panic!("host exploded") },
            transport.clone(),
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "PNG", 0));

        assert_eq!(failure.reason, FailureReason::UnexpectedError);
        assert!(failure.message.contains("host exploded"));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn shape_error_is_an_encoding_failure() {
        let transport = MockTransport::replying(200, "{}");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(4, 4, 1, 1.0)),
            transport.clone(),
        );

        let failure = failure_of(uploader.upload("render_out", "p3a.local", "PNG", 0));

        assert_eq!(failure.reason, FailureReason::EncodingError);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn base_config_timeout_is_forwarded() {
        let transport = MockTransport::replying(200, "{}");
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(4, 4, 3, 1.0)),
            transport.clone(),
        )
        .with_config(UploadConfig {
            timeout: Duration::from_millis(1500),
            ..UploadConfig::default()
        });

        assert!(uploader.upload("render_out", "p3a.local", "png", 1000).is_success());
        assert_eq!(
            transport.seen.lock().unwrap()[0].timeout,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn default_config_upload_uses_defaults() {
        let transport = MockTransport::replying(200, r#"{"ok":true}"#);
        let uploader = FrameUploader::with_transport(
            resolver_with("render_out", FrameBuffer::filled(720, 720, 4, 0.5)),
            transport.clone(),
        );

        let result = uploader.upload_with_config(&UploadConfig::default());

        assert!(result.is_success());
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://p3a.local/upload/image");
        assert_eq!(seen[0].file_name, "td_frame.jpg");
    }
}
