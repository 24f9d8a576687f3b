//! 命令行客户端使用的 HTTP/SSE 客户端

mod fleet_client;
mod sse;

pub use fleet_client::{format_status, FleetClient};
pub use sse::{SseDecoder, SseEvent};
