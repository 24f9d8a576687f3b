use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::context::IContext;
use crate::error::Result;
use crate::metrics::PROMETHEUS_CONTENT_TYPE;
use crate::service::{
    DeviceStatusMessage, ReleaseRequest, ReleaseResponse, ReserveRequest, ReserveResponse,
    DEVICE_EVENT,
};

/// 每个订阅者的推送缓冲
const WATCH_BUFFER: usize = 64;

type SharedContext = Arc<dyn IContext + Sync + Send>;

/// 设备列表响应
#[derive(Debug, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceStatusMessage>,
    pub count: usize,
}

pub struct ApiServer {
    pub app: Router,
}

impl ApiServer {
    pub fn new(ctx: SharedContext) -> Self {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/devices", get(Self::list_devices))
            .route("/devices/reserve", post(Self::reserve_device))
            .route("/devices/release", post(Self::release_device))
            .route("/devices/watch", get(Self::watch_devices))
            .route("/metrics", get(Self::metrics))
            .route("/health", get(Self::health))
            .layer(cors)
            .with_state(ctx);
        ApiServer { app }
    }

    /// 启动 API 服务器，收到 Ctrl+C 后退出
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API 服务器监听于 http://{}", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("监听退出信号失败: {:?}", e);
                }
                info!("收到退出信号，正在关闭服务器");
            })
            .await?;
        Ok(())
    }

    /// 预约设备
    async fn reserve_device(
        State(ctx): State<SharedContext>,
        Json(req): Json<ReserveRequest>,
    ) -> Json<ReserveResponse> {
        debug!("收到预约请求: {:?}", req);
        Json(ctx.get_service().reserve_device(req).await)
    }

    /// 释放设备
    async fn release_device(
        State(ctx): State<SharedContext>,
        Json(req): Json<ReleaseRequest>,
    ) -> Json<ReleaseResponse> {
        debug!("收到释放请求: {}", req.device_id);
        Json(ctx.get_service().release_device(req).await)
    }

    /// 获取设备列表
    async fn list_devices(State(ctx): State<SharedContext>) -> Json<DevicesResponse> {
        let devices = ctx.get_service().list_devices().await;
        let count = devices.len();
        Json(DevicesResponse { devices, count })
    }

    /// 订阅设备状态（SSE）
    ///
    /// 客户端断开后响应流被 drop，订阅句柄随之 drop，推送任务结束。
    async fn watch_devices(
        State(ctx): State<SharedContext>,
    ) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let subscription = ctx.get_service().watch_devices(tx);
        info!(subscription_id = %subscription.id(), "新的 SSE 订阅");

        let stream = ReceiverStream::new(rx).filter_map(move |msg| {
            let _subscription = &subscription;
            match Event::default().event(DEVICE_EVENT).json_data(&msg) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!("序列化设备状态失败: {:?}", e);
                    None
                }
            }
        });

        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
    }

    /// 指标（Prometheus 文本格式）
    async fn metrics(State(ctx): State<SharedContext>) -> impl IntoResponse {
        (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            ctx.render_metrics(),
        )
    }

    async fn health() -> &'static str {
        "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SseDecoder;
    use crate::config::{DeviceGroupConfig, FleetConfig};
    use crate::context::Context;
    use crate::service::{
        DeviceStatusMessage, STATUS_NOT_FOUND, STATUS_NO_DEVICES, STATUS_RELEASED, STATUS_RESERVED,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_context(count: usize) -> SharedContext {
        let mut config = FleetConfig::default();
        config.pool.groups = vec![DeviceGroupConfig {
            device_type: "iphone".to_string(),
            count,
        }];
        config.service.watch_interval_ms = 50;
        Arc::new(Context::new(&config).unwrap())
    }

    fn test_app(count: usize) -> Router {
        ApiServer::new(test_context(count)).app
    }

    async fn get_text(app: &Router, uri: &str) -> String {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        app: &Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, T) {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: &Router, uri: &str) -> T {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_reserve_and_release_over_http() {
        let app = test_app(10);

        let (status, reserved): (_, ReserveResponse) = post_json(
            &app,
            "/devices/reserve",
            serde_json::json!({ "user": "testuser", "device_type": "iphone" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reserved.status, STATUS_RESERVED);
        assert_eq!(reserved.device_id, "iphone-0");

        let (_, released): (_, ReleaseResponse) = post_json(
            &app,
            "/devices/release",
            serde_json::json!({ "device_id": reserved.device_id }),
        )
        .await;
        assert_eq!(released.status, STATUS_RELEASED);

        let (_, again): (_, ReleaseResponse) = post_json(
            &app,
            "/devices/release",
            serde_json::json!({ "device_id": "iphone-0" }),
        )
        .await;
        assert_eq!(again.status, STATUS_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_exhaustion_over_http() {
        let app = test_app(1);

        let (_, first): (_, ReserveResponse) =
            post_json(&app, "/devices/reserve", serde_json::json!({ "user": "a" })).await;
        assert_eq!(first.device_id, "iphone-0");

        let (status, second): (_, ReserveResponse) =
            post_json(&app, "/devices/reserve", serde_json::json!({ "user": "b" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second.device_id, "");
        assert_eq!(second.status, STATUS_NO_DEVICES);

        let metrics = get_text(&app, "/metrics").await;
        assert!(metrics.contains("fleet_reservations_total{outcome=\"success\"} 1"));
        assert!(metrics.contains("fleet_reservations_total{outcome=\"failure\"} 1"));
    }

    #[tokio::test]
    async fn test_metrics_is_prometheus_text() {
        let app = test_app(2);
        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            PROMETHEUS_CONTENT_TYPE
        );

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE fleet_devices_available gauge"));
        assert!(text.contains("# TYPE fleet_active_watches gauge"));
    }

    #[tokio::test]
    async fn test_list_devices_over_http() {
        let app = test_app(3);
        let _: (_, ReserveResponse) =
            post_json(&app, "/devices/reserve", serde_json::json!({ "user": "occupied" })).await;

        let devices: DevicesResponse = get_json(&app, "/devices").await;
        assert_eq!(devices.count, 3);
        assert_eq!(devices.devices.iter().filter(|d| !d.available).count(), 1);
    }

    #[tokio::test]
    async fn test_watch_streams_device_events() {
        let ctx = test_context(3);
        let app = ApiServer::new(Arc::clone(&ctx)).app;
        ctx.get_service()
            .pool()
            .reserve("occupied", "iphone", chrono::Duration::minutes(5))
            .await
            .unwrap();

        let resp = app
            .oneshot(Request::builder().uri("/devices/watch").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let mut body = resp.into_body().into_data_stream();
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        while events.len() < 3 {
            let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
                .await
                .expect("等待推送超时")
                .expect("订阅流提前结束")
                .unwrap();
            events.extend(decoder.push(&chunk));
        }

        assert!(events.iter().all(|e| e.event.as_deref() == Some("device")));
        let first: serde_json::Value = serde_json::from_str(&events[0].data).unwrap();
        assert_eq!(
            first,
            serde_json::json!({ "device_id": "iphone-0", "reserved_by": "occupied", "available": false })
        );
        let batch: Vec<DeviceStatusMessage> = events[..3]
            .iter()
            .map(|e| serde_json::from_str(&e.data).unwrap())
            .collect();
        let ids: Vec<&str> = batch.iter().map(|m| m.device_id.as_str()).collect();
        assert_eq!(ids, vec!["iphone-0", "iphone-1", "iphone-2"]);
        assert!(batch[1].available && batch[2].available);
        assert_eq!(ctx.get_metrics().active_watches, 1);

        // 客户端断开：响应体被 drop，订阅随之取消
        drop(body);
        tokio::time::timeout(Duration::from_secs(1), async {
            while ctx.get_metrics().active_watches != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("断开后订阅应结束");
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(1);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
