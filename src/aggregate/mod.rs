//! 多路汇总 (Aggregator)
//!
//! 只读取各跟踪器已发布的 `(状态, 计数)`; 非推流状态的摄像头不计入汇总。
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::registry::{Counters, OrderCounts};
use crate::tracker::{CameraStatus, CameraTracker};

/// 单路摄像头在快照中的状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraReport {
    pub camera_id: String,
    pub status: CameraStatus,
    /// 仅推流中的摄像头有计数
    pub counters: Option<Counters>,
}

/// 全店快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Local>,
    pub current_occupancy: u64,
    pub total_entries: u64,
    pub total_exits: u64,
    pub order_counts: OrderCounts,
    pub streaming_cameras: usize,
    pub cameras: Vec<CameraReport>,
}

pub struct Aggregator {
    trackers: Vec<Arc<CameraTracker>>,
}

impl Aggregator {
    pub fn new(trackers: Vec<Arc<CameraTracker>>) -> Self {
        Self { trackers }
    }

    pub fn trackers(&self) -> &[Arc<CameraTracker>] {
        &self.trackers
    }

    pub fn sample(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            taken_at: Local::now(),
            current_occupancy: 0,
            total_entries: 0,
            total_exits: 0,
            order_counts: OrderCounts::default(),
            streaming_cameras: 0,
            cameras: Vec::with_capacity(self.trackers.len()),
        };

        for tracker in &self.trackers {
            let (status, counters) = tracker.sample();
            let streaming = status == CameraStatus::Streaming;
            if streaming {
                snapshot.current_occupancy += counters.occupancy();
                snapshot.total_entries += counters.entry_count;
                snapshot.total_exits += counters.exit_count;
                snapshot.order_counts.accumulate(&counters.orders);
                snapshot.streaming_cameras += 1;
            }
            snapshot.cameras.push(CameraReport {
                camera_id: tracker.camera_id().to_string(),
                status,
                counters: streaming.then_some(counters),
            });
        }
        snapshot
    }
}
