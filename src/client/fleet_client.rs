//! 设备租约服务的 HTTP 客户端

use super::sse::SseDecoder;
use crate::error::{AppError, Result};
use crate::service::{
    DeviceStatusMessage, ReleaseRequest, ReleaseResponse, ReserveRequest, ReserveResponse,
    DEVICE_EVENT,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// 设备租约服务客户端
pub struct FleetClient {
    client: Client,
    base_url: String,
}

impl FleetClient {
    /// 创建客户端，`base_url` 形如 `http://localhost:8080`
    pub fn new(base_url: &str) -> Result<Self> {
        // 订阅是长连接，不设置整体超时
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 预约设备
    pub async fn reserve(&self, user: &str, device_type: &str) -> Result<ReserveResponse> {
        let req = ReserveRequest {
            user: user.to_string(),
            device_type: device_type.to_string(),
        };
        self.post_json("/devices/reserve", &req).await
    }

    /// 释放设备
    pub async fn release(&self, device_id: &str) -> Result<ReleaseResponse> {
        let req = ReleaseRequest {
            device_id: device_id.to_string(),
        };
        self.post_json("/devices/release", &req).await
    }

    /// 订阅设备状态
    ///
    /// 每收到一条状态调用一次 `on_message`，返回 `Break` 时结束订阅。
    /// 服务端关闭连接时正常返回。
    pub async fn watch<F>(&self, mut on_message: F) -> Result<()>
    where
        F: FnMut(DeviceStatusMessage) -> ControlFlow<()>,
    {
        let url = format!("{}/devices/watch", self.base_url);
        debug!("订阅设备状态: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let mut byte_stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = byte_stream.next().await {
            for event in decoder.push(&chunk?) {
                if event.event.as_deref() != Some(DEVICE_EVENT) {
                    warn!("忽略未知事件: {:?}", event.event);
                    continue;
                }

                let message: DeviceStatusMessage = serde_json::from_str(&event.data)?;
                if on_message(message).is_break() {
                    return Ok(());
                }
            }
        }

        debug!("服务端关闭了订阅连接");
        Ok(())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            return Err(AppError::Unknown(format!("请求失败: {} - {}", status, error_text)));
        }

        Ok(response.json().await?)
    }
}

/// 单台设备状态的文本形式，如 `iphone-0: available` 或 `iphone-1: reserved by alice`
pub fn format_status(message: &DeviceStatusMessage) -> String {
    if message.available {
        format!("{}: available", message.device_id)
    } else {
        format!("{}: reserved by {}", message.device_id, message.reserved_by)
    }
}
