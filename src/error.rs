use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::config::ConfigError;
use crate::pool::DevicePoolError;

/// 应用程序统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 订阅流发送失败
    #[error("订阅流发送失败: {0}")]
    StreamSend(String),

    /// 设备池构建错误
    #[error("设备池错误: {0}")]
    Pool(#[from] DevicePoolError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP 请求错误
    #[error("HTTP 请求错误: {0}")]
    HttpError(#[from] reqwest::Error),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

/// AppError 的 Result 类型别名
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// 将错误转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::StreamSend(_) => 500,
            AppError::Pool(_) => 500,
            AppError::Config(_) => 500,
            AppError::IoError(_) => 500,
            AppError::JsonError(_) => 400,
            AppError::HttpError(_) => 502,
            AppError::Unknown(_) => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
