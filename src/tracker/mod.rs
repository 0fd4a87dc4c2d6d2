//! 单路摄像头跟踪器 (Per-Camera Tracker)
//!
//! 每帧: 加锁 → 人脸检测 + 订单检测 → 登记簿更新 → 订单归属 → 发布计数
//!
//! 两把锁:
//! - `core`: 串行化 `on_frame`,保护登记簿与检测器
//! - `published`: 只保存 `(状态, 计数)`,聚合器只读这一把锁,不会等待检测完成
pub mod orders;
pub mod zone;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

pub use orders::{DetectedOrders, OrderEvent, OrderSighting, OrderSignal, SimulatedOrders};
pub use zone::{Zone, ZoneLines, ZoneOccupancy};

use crate::detection::FaceDetector;
use crate::input::Frame;
use crate::registry::{Counters, CustomerId, CustomerRegistry};
use crate::{Error, Result};

/// 摄像头状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// 已配置,未推流
    #[default]
    Idle,
    Streaming,
    /// 启动前检查时帧源不存在
    NotDetected,
    /// 启动时帧源无法打开
    Unavailable,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CameraStatus::Idle => "Camera Ready",
            CameraStatus::Streaming => "Streaming",
            CameraStatus::NotDetected => "No Camera Detected",
            CameraStatus::Unavailable => "Connection Failed",
        };
        f.write_str(label)
    }
}

/// 单帧处理结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 通过阈值的人脸数
    pub faces: usize,
    pub minted: Vec<CustomerId>,
    pub exited: Vec<CustomerId>,
    pub orders: Vec<OrderEvent>,
    /// 在店顾客的区域分布
    pub zones: ZoneOccupancy,
}

struct TrackerCore {
    registry: CustomerRegistry,
    faces: FaceDetector,
    orders: Box<dyn OrderSignal>,
}

#[derive(Clone, Copy)]
struct Published {
    status: CameraStatus,
    counters: Counters,
}

pub struct CameraTracker {
    camera_id: String,
    zones: ZoneLines,
    core: Mutex<TrackerCore>,
    published: Mutex<Published>,
}

impl CameraTracker {
    pub fn new(
        camera_id: impl Into<String>,
        registry: CustomerRegistry,
        faces: FaceDetector,
        orders: Box<dyn OrderSignal>,
        zones: ZoneLines,
    ) -> Self {
        let counters = registry.counters();
        Self {
            camera_id: camera_id.into(),
            zones,
            core: Mutex::new(TrackerCore {
                registry,
                faces,
                orders,
            }),
            published: Mutex::new(Published {
                status: CameraStatus::Idle,
                counters,
            }),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn zones(&self) -> ZoneLines {
        self.zones
    }

    // 处理线程 panic 后锁被污染: 登记簿只在完整的一帧之后才发布,继续使用
    fn lock_core(&self) -> MutexGuard<'_, TrackerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_published(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 处理一帧
    ///
    /// 检测失败时本帧被跳过,登记簿保持不变。
    pub fn on_frame(&self, frame: &Frame) -> Result<TickReport> {
        let mut core = self.lock_core();

        if self.status() != CameraStatus::Streaming {
            return Err(Error::NotStreaming {
                camera: self.camera_id.clone(),
            });
        }

        let TrackerCore {
            registry,
            faces,
            orders,
        } = &mut *core;

        // 两个检测都在修改登记簿之前完成
        let detected = faces
            .detect(frame)
            .and_then(|detections| orders.detect(frame).map(|sightings| (detections, sightings)));
        let (detections, sightings) = match detected {
            Ok(v) => v,
            Err(e) => {
                warn!(camera = %self.camera_id, frame = frame.index, "skipping tick: {}", e);
                return Err(e);
            }
        };

        let outcome = registry.update(&detections, frame.timestamp);

        let present = registry.in_store();
        let applied: Vec<OrderEvent> = orders
            .attribute(&sightings, &present)
            .into_iter()
            .filter(|event| registry.record_order(event.customer, event.kind))
            .collect();

        let mut zones = ZoneOccupancy::default();
        for position in present.iter().filter_map(|(_, p)| p.as_ref()) {
            zones.add(self.zones.zone_of(position, frame.height()));
        }

        self.lock_published().counters = registry.counters();

        let report = TickReport {
            faces: outcome.accepted,
            minted: outcome.minted,
            exited: outcome.exited,
            orders: applied,
            zones,
        };
        if !report.minted.is_empty() || !report.exited.is_empty() || !report.orders.is_empty() {
            debug!(
                camera = %self.camera_id,
                frame = frame.index,
                faces = report.faces,
                minted = ?report.minted,
                exited = ?report.exited,
                orders = report.orders.len(),
                "tick applied"
            );
        }
        Ok(report)
    }

    pub fn status(&self) -> CameraStatus {
        self.lock_published().status
    }

    pub fn counters(&self) -> Counters {
        self.lock_published().counters
    }

    /// 一次读取状态与计数 (同一时刻的值)
    pub fn sample(&self) -> (CameraStatus, Counters) {
        let published = *self.lock_published();
        (published.status, published.counters)
    }

    pub(crate) fn set_status(&self, status: CameraStatus) {
        let mut published = self.lock_published();
        if published.status != status {
            debug!(camera = %self.camera_id, "status {} -> {}", published.status, status);
            published.status = status;
        }
    }

    /// 只读访问登记簿 (会等待正在进行的一帧)
    pub fn with_registry<R>(&self, f: impl FnOnce(&CustomerRegistry) -> R) -> R {
        f(&self.lock_core().registry)
    }

    pub fn face_detector_name(&self) -> String {
        self.lock_core().faces.name().to_string()
    }

    pub fn order_signal_name(&self) -> String {
        self.lock_core().orders.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, Detect, Detection, OrderDetection, Point, ScriptedDetector};
    use crate::registry::{NearestCentroid, OrderKind};
    use chrono::{Duration, Local};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    fn face(x: f32, y: f32, confidence: f32) -> Detection {
        Detection::new(BBox::new(x - 10.0, y - 10.0, x + 10.0, y + 10.0), confidence)
    }

    fn no_orders() -> Box<dyn OrderSignal> {
        Box::new(SimulatedOrders::new(0.0, 0.0, Some(1)).unwrap())
    }

    fn tracker(faces: Vec<Vec<Detection>>) -> CameraTracker {
        let tracker = CameraTracker::new(
            "0",
            CustomerRegistry::with_recency(0.7),
            Box::new(ScriptedDetector::new("faces", faces, false)),
            no_orders(),
            ZoneLines::default(),
        );
        tracker.set_status(CameraStatus::Streaming);
        tracker
    }

    struct Failing;

    impl Detect for Failing {
        type Output = Detection;

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Err(Error::Detection("model crashed".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn out_of_order_frame_timestamps_never_move_times_backwards() {
        let tracker = tracker(vec![
            vec![face(320.0, 240.0, 0.9)],
            vec![face(322.0, 240.0, 0.9)],
            vec![],
        ]);
        let t0 = Local::now();
        let late = t0 + Duration::seconds(10);

        tracker.on_frame(&Frame::blank(640, 480, 0).with_timestamp(late)).unwrap();
        tracker.on_frame(&Frame::blank(640, 480, 1).with_timestamp(t0)).unwrap();
        tracker.with_registry(|r| {
            let c = r.customer(1).unwrap();
            assert_eq!(c.last_seen(), late);
            assert_eq!(c.position(), Some(Point::new(322.0, 240.0)));
        });

        let report = tracker
            .on_frame(&Frame::blank(640, 480, 2).with_timestamp(t0 + Duration::seconds(5)))
            .unwrap();
        assert_eq!(report.exited, vec![1]);
        tracker.with_registry(|r| {
            let c = r.customer(1).unwrap();
            assert_eq!(c.exit_time(), Some(late));
            assert!(c.entry_time() <= c.last_seen());
        });
        let counters = tracker.counters();
        assert_eq!((counters.entry_count, counters.exit_count), (1, 1));
    }

    #[test]
    fn entry_then_exit_across_two_ticks() {
        let tracker = tracker(vec![vec![face(320.0, 240.0, 0.9)], vec![]]);
        let frame = Frame::blank(640, 480, 0);

        let report = tracker.on_frame(&frame).unwrap();
        assert_eq!(report.minted, vec![1]);
        assert_eq!(report.zones.floor, 1);
        assert_eq!(tracker.counters().entry_count, 1);
        assert!(tracker.with_registry(|r| r.customer(1).unwrap().in_store()));

        let report = tracker.on_frame(&frame).unwrap();
        assert_eq!(report.exited, vec![1]);
        let counters = tracker.counters();
        assert_eq!((counters.entry_count, counters.exit_count), (1, 1));
        tracker.with_registry(|r| {
            let c = r.customer(1).unwrap();
            assert!(!c.in_store());
            assert!(c.exit_time().is_some());
        });
    }

    #[test]
    fn threshold_boundary_detection_is_ignored() {
        let tracker = tracker(vec![vec![face(320.0, 240.0, 0.7)]]);
        let report = tracker.on_frame(&Frame::blank(640, 480, 0)).unwrap();
        assert_eq!(report.faces, 0);
        assert_eq!(tracker.counters(), Counters::default());
    }

    #[test]
    fn idle_tracker_refuses_frames() {
        let tracker = tracker(vec![vec![face(1.0, 1.0, 0.9)]]);
        tracker.set_status(CameraStatus::Idle);
        let err = tracker.on_frame(&Frame::blank(8, 8, 0)).unwrap_err();
        assert!(matches!(err, Error::NotStreaming { .. }));
        assert_eq!(tracker.counters(), Counters::default());
    }

    #[test]
    fn failed_detection_leaves_state_untouched() {
        let tracker = tracker(vec![vec![face(100.0, 100.0, 0.9)]]);
        tracker.on_frame(&Frame::blank(640, 480, 0)).unwrap();
        let before = tracker.counters();

        let broken = CameraTracker::new(
            "1",
            CustomerRegistry::with_recency(0.7),
            Box::new(Failing),
            no_orders(),
            ZoneLines::default(),
        );
        broken.set_status(CameraStatus::Streaming);
        assert!(broken.on_frame(&Frame::blank(640, 480, 0)).is_err());
        assert_eq!(broken.counters(), Counters::default());
        assert!(broken.with_registry(|r| r.customers().is_empty()));

        // 订单检测失败同样跳过整帧: 人脸结果不会生效
        let failing_orders: Box<dyn Detect<Output = OrderDetection>> = Box::new(FailingOrders);
        let tracker = CameraTracker::new(
            "2",
            CustomerRegistry::with_recency(0.7),
            Box::new(ScriptedDetector::repeating("faces", vec![face(1.0, 1.0, 0.9)])),
            Box::new(DetectedOrders::new(failing_orders, 0.6, HashMap::new())),
            ZoneLines::default(),
        );
        tracker.set_status(CameraStatus::Streaming);
        assert!(tracker.on_frame(&Frame::blank(640, 480, 0)).is_err());
        assert_eq!(tracker.counters(), Counters::default());
        assert_eq!(before.entry_count, 1);
    }

    struct FailingOrders;

    impl Detect for FailingOrders {
        type Output = OrderDetection;

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<OrderDetection>> {
            Err(Error::Detection("order model crashed".into()))
        }

        fn name(&self) -> &str {
            "failing-orders"
        }
    }

    #[test]
    fn detected_orders_are_recorded_on_the_nearest_customer() {
        let faces = vec![face(100.0, 240.0, 0.9), face(500.0, 240.0, 0.9)];
        let cup = OrderDetection::new("cup", 0.9, BBox::new(480.0, 230.0, 500.0, 250.0));
        let tracker = CameraTracker::new(
            "0",
            CustomerRegistry::new(0.7, Box::new(NearestCentroid::new(50.0))),
            Box::new(ScriptedDetector::repeating("faces", faces)),
            Box::new(DetectedOrders::new(
                Box::new(ScriptedDetector::repeating("orders", vec![cup])),
                0.6,
                HashMap::new(),
            )),
            ZoneLines::default(),
        );
        tracker.set_status(CameraStatus::Streaming);

        for i in 0..3 {
            let report = tracker.on_frame(&Frame::blank(640, 480, i)).unwrap();
            assert_eq!(report.orders.len(), 1);
        }
        let counters = tracker.counters();
        assert_eq!(counters.entry_count, 2);
        assert_eq!(counters.orders.get(OrderKind::Coffee), 3);
        tracker.with_registry(|r| {
            assert_eq!(r.customer(2).unwrap().orders().get(OrderKind::Coffee), 3);
            assert_eq!(r.customer(1).unwrap().orders().total(), 0);
        });
    }

    #[test]
    fn concurrent_ticks_mint_at_most_one_customer_each() {
        const N: usize = 16;
        let faces = vec![face(10.0, 10.0, 0.9), face(300.0, 200.0, 0.95), face(600.0, 400.0, 0.8)];
        let tracker = Arc::new(CameraTracker::new(
            "0",
            CustomerRegistry::with_recency(0.7),
            Box::new(ScriptedDetector::repeating("faces", faces)),
            Box::new(SimulatedOrders::new(0.5, 0.5, Some(3)).unwrap()),
            ZoneLines::default(),
        ));
        tracker.set_status(CameraStatus::Streaming);

        let readers_done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader = {
            let tracker = Arc::clone(&tracker);
            let done = Arc::clone(&readers_done);
            thread::spawn(move || {
                while !done.load(std::sync::atomic::Ordering::Relaxed) {
                    let (_, c) = tracker.sample();
                    // 每帧恰好新建一位、其余离店: 已发布的值不会出现半帧
                    assert!(c.exit_count + 1 == c.entry_count || c.entry_count == 0);
                }
            })
        };

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.on_frame(&Frame::blank(640, 480, i as u64)).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        readers_done.store(true, std::sync::atomic::Ordering::Relaxed);
        reader.join().unwrap();

        let counters = tracker.counters();
        assert!(counters.entry_count <= N as u64);
        assert_eq!(counters.entry_count, N as u64);
        assert_eq!(counters.exit_count, N as u64 - 1);
        tracker.with_registry(|r| {
            assert_eq!(r.counters(), counters);
            let per_customer: u64 = r.customers().iter().map(|c| c.orders().total()).sum();
            assert_eq!(per_customer, counters.orders.total());
        });
    }

    #[test]
    fn status_labels() {
        assert_eq!(CameraStatus::Idle.to_string(), "Camera Ready");
        assert_eq!(CameraStatus::NotDetected.to_string(), "No Camera Detected");
        assert_eq!(CameraStatus::Unavailable.to_string(), "Connection Failed");
    }
}
