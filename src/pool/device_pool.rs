//! 设备池实现
//!
//! 持有固定数量的设备条目，负责预约、释放、过期清理和快照。
//! 所有读改写操作都在同一把池级读写锁下完成。

use super::device_entry::DeviceEntry;
use super::types::{DevicePoolError, DevicePoolEvent, DeviceSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 事件通道容量，接收方落后时会收到 `Lagged`
const EVENT_CAPACITY: usize = 256;

/// 设备池
pub struct DevicePool {
    /// 设备列表，构建后长度与顺序不变
    devices: RwLock<Vec<DeviceEntry>>,

    /// 构建顺序下的设备类型
    device_types: Vec<String>,

    /// 事件发送器
    event_tx: broadcast::Sender<DevicePoolEvent>,
}

impl DevicePool {
    /// 创建单一类型的设备池，设备 ID 为 `{type}-{index}`
    pub fn new(device_type: &str, count: usize) -> Result<Self, DevicePoolError> {
        Self::with_groups([(device_type, count)])
    }

    /// 按分组创建设备池，各组依次排列，索引在组内从 0 开始
    pub fn with_groups<I, S>(groups: I) -> Result<Self, DevicePoolError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut device_types = Vec::new();
        let mut devices = Vec::new();

        for (device_type, count) in groups {
            let device_type = device_type.into();
            if device_type.is_empty() {
                return Err(DevicePoolError::EmptyDeviceType);
            }
            if !seen.insert(device_type.clone()) {
                return Err(DevicePoolError::DuplicateDeviceType(device_type));
            }

            devices.extend(
                (0..count).map(|i| DeviceEntry::new(format!("{}-{}", device_type, i), device_type.clone())),
            );
            device_types.push(device_type);
        }

        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        info!("设备池已创建: {} 台设备, 类型 {:?}", devices.len(), device_types);

        Ok(Self {
            devices: RwLock::new(devices),
            device_types,
            event_tx,
        })
    }

    /// 订阅事件
    pub fn subscribe_events(&self) -> broadcast::Receiver<DevicePoolEvent> {
        self.event_tx.subscribe()
    }

    /// 设备总数
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// 设备类型列表（构建顺序）
    pub fn device_types(&self) -> &[String] {
        &self.device_types
    }

    /// 预约设备
    ///
    /// 按构建顺序选出第一台类型匹配且可用的设备。没有可用设备时返回 `None`。
    pub async fn reserve(&self, user: &str, device_type: &str, ttl: Duration) -> Option<DeviceEntry> {
        let mut devices = self.devices.write().await;
        let now = Utc::now();

        let entry = devices
            .iter_mut()
            .find(|d| d.device_type == device_type && d.is_available_at(now))?;

        entry.lease(user, now, ttl);
        let reserved = entry.clone();

        if let Some(expires_at) = reserved.expires_at {
            let _ = self.event_tx.send(DevicePoolEvent::Reserved {
                device_id: reserved.id.clone(),
                reserved_by: user.to_string(),
                expires_at,
                available: count_available(&devices, now),
            });
        }
        drop(devices);

        debug!(device_id = %reserved.id, user = %user, "设备已预约");
        Some(reserved)
    }

    /// 释放设备
    ///
    /// 仅当设备存在且当前被占用时返回 `true`。
    pub async fn release(&self, device_id: &str) -> bool {
        let mut devices = self.devices.write().await;
        let now = Utc::now();

        let Some(entry) = devices
            .iter_mut()
            .find(|d| d.id == device_id && !d.is_available_at(now))
        else {
            debug!(device_id = %device_id, "设备未找到或已可用");
            return false;
        };

        entry.clear();
        let _ = self.event_tx.send(DevicePoolEvent::Released {
            device_id: device_id.to_string(),
            available: count_available(&devices, now),
        });
        drop(devices);

        debug!(device_id = %device_id, "设备已释放");
        true
    }

    /// 获取所有设备快照
    ///
    /// 在同一读锁范围内复制全部设备，可用状态按同一时刻计算。
    pub async fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let devices = self.devices.read().await;
        let now = Utc::now();
        devices.iter().map(|d| d.to_snapshot(now)).collect()
    }

    /// 可用设备数量，可按类型过滤
    pub async fn available_count(&self, device_type: Option<&str>) -> usize {
        let devices = self.devices.read().await;
        let now = Utc::now();
        devices
            .iter()
            .filter(|d| device_type.is_none_or(|t| d.device_type == t))
            .filter(|d| d.is_available_at(now))
            .count()
    }

    /// 清理过期租约，返回清理数量
    pub async fn sweep_expired(&self) -> usize {
        let mut devices = self.devices.write().await;
        let now = Utc::now();

        let mut expired = Vec::new();
        for entry in devices.iter_mut().filter(|d| d.is_expired_at(now)) {
            if let Some(holder) = entry.reserved_by.clone() {
                expired.push((entry.id.clone(), holder));
            }
            entry.clear();
        }

        // 过期租约本就计为可用，清理前后数量不变
        let available = count_available(&devices, now);
        for (device_id, reserved_by) in &expired {
            let _ = self.event_tx.send(DevicePoolEvent::Expired {
                device_id: device_id.clone(),
                reserved_by: reserved_by.clone(),
                available,
            });
        }

        expired.len()
    }
}

fn count_available(devices: &[DeviceEntry], now: DateTime<Utc>) -> usize {
    devices.iter().filter(|d| d.is_available_at(now)).count()
}
