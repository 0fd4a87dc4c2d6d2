/// 系统架构 (System Architecture)
///
/// 每路摄像头一个驱动线程 + 一个汇总线程:
/// - CameraStream:     读帧 → 跟踪器 `on_frame` (独立线程)
/// - AggregatorDriver: 周期汇总 → SnapshotBoard (独立线程)
/// - StoreMonitor:     按配置装配以上组件
pub mod board;
pub mod driver;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

pub use board::{follow, AggregatorDriver, SnapshotBoard};
pub use driver::CameraStream;

use crate::aggregate::{Aggregator, Snapshot};
use crate::config::{DetectorSettings, IdentitySettings, OrderSettings, Settings};
use crate::detection::{DetectionScript, FaceDetector, OrderDetector};
use crate::input::{ImageDirOpener, SourceOpener, SyntheticOpener};
use crate::registry::{CustomerRegistry, IdentityPolicy, NearestCentroid, RecencyBinding};
use crate::tracker::{CameraTracker, DetectedOrders, OrderSignal, SimulatedOrders, ZoneLines};
use crate::{Error, Result};

/// 订单检测 NMS 阈值
#[cfg(feature = "onnx")]
const ORDER_IOU_THRESHOLD: f32 = 0.45;

/// 已校验的检测后端
enum Backend {
    Scripted(DetectionScript),
    #[cfg(feature = "onnx")]
    Onnx {
        face_model: std::path::PathBuf,
        order_model: std::path::PathBuf,
    },
}

impl Backend {
    /// 模型/脚本文件缺失在这里失败,早于任何摄像头启动
    fn load(settings: &Settings) -> Result<Self> {
        match &settings.detector {
            DetectorSettings::Scripted { path } => {
                let script = DetectionScript::load(path)?;
                info!("📜 检测脚本 {} ({} 路)", path.display(), script.cameras.len());
                Ok(Backend::Scripted(script))
            }
            DetectorSettings::Onnx {
                face_model,
                order_model,
            } => {
                let mut required = vec![face_model];
                if matches!(settings.orders, OrderSettings::Detected { .. }) {
                    required.push(order_model);
                }
                if let Some(missing) = required.into_iter().find(|p| !p.exists()) {
                    return Err(Error::MissingModel {
                        path: missing.clone(),
                    });
                }
                Self::onnx(face_model, order_model)
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn onnx(face_model: &std::path::Path, order_model: &std::path::Path) -> Result<Self> {
        Ok(Backend::Onnx {
            face_model: face_model.to_path_buf(),
            order_model: order_model.to_path_buf(),
        })
    }

    #[cfg(not(feature = "onnx"))]
    fn onnx(_face_model: &std::path::Path, _order_model: &std::path::Path) -> Result<Self> {
        Err(Error::Config(
            "detector backend \"onnx\" requires building with --features onnx".into(),
        ))
    }

    fn face_detector(&self, camera_id: &str) -> Result<FaceDetector> {
        match self {
            Backend::Scripted(script) => Ok(Box::new(script.face_detector(camera_id))),
            #[cfg(feature = "onnx")]
            Backend::Onnx { face_model, .. } => Ok(Box::new(crate::detection::SsdFaceDetector::new(face_model)?)),
        }
    }

    #[cfg_attr(not(feature = "onnx"), allow(unused_variables))]
    fn order_detector(&self, camera_id: &str, min_confidence: f32) -> Result<OrderDetector> {
        match self {
            Backend::Scripted(script) => Ok(Box::new(script.order_detector(camera_id))),
            #[cfg(feature = "onnx")]
            Backend::Onnx { order_model, .. } => Ok(Box::new(crate::detection::YoloOrderDetector::new(
                order_model,
                min_confidence,
                ORDER_IOU_THRESHOLD,
            )?)),
        }
    }
}

fn identity_policy(settings: &IdentitySettings) -> Box<dyn IdentityPolicy> {
    match *settings {
        IdentitySettings::Recency => Box::new(RecencyBinding),
        IdentitySettings::NearestCentroid { max_distance } => Box::new(NearestCentroid::new(max_distance)),
    }
}

fn order_signal(settings: &Settings, backend: &Backend, camera_id: &str) -> Result<Box<dyn OrderSignal>> {
    Ok(match &settings.orders {
        OrderSettings::Simulated {
            coffee_probability,
            meal_probability,
            seed,
        } => {
            // 每路摄像头使用不同的随机序列
            let seed = seed.map(|s| s.wrapping_add(fnv1a(camera_id)));
            Box::new(SimulatedOrders::new(*coffee_probability, *meal_probability, seed)?)
        }
        OrderSettings::Detected { labels } => Box::new(DetectedOrders::new(
            backend.order_detector(camera_id, settings.order_confidence)?,
            settings.order_confidence,
            labels.clone(),
        )),
    })
}

fn fnv1a(s: &str) -> u64 {
    s.bytes()
        .fold(0xcbf29ce484222325, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3))
}

fn source_opener(settings: &Settings, camera_id: &str) -> Box<dyn SourceOpener> {
    if settings.synthetic {
        Box::new(SyntheticOpener::new(settings.frame_size.width, settings.frame_size.height))
    } else {
        Box::new(ImageDirOpener::new(settings.frames_root.join(camera_id), settings.loop_frames))
    }
}

/// 门店监控: 多路摄像头 + 汇总
pub struct StoreMonitor {
    settings: Settings,
    trackers: Vec<Arc<CameraTracker>>,
    streams: Vec<CameraStream>,
    board: SnapshotBoard,
    aggregator: Option<AggregatorDriver>,
}

impl StoreMonitor {
    /// 校验配置、加载检测后端、为每路摄像头创建跟踪器 (尚未启动)
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let backend = Backend::load(&settings)?;
        let zones = ZoneLines::new(settings.entrance_line, settings.exit_line)?;
        let period = Duration::from_millis(settings.refresh_rate_ms);

        let mut trackers = Vec::new();
        let mut streams = Vec::new();
        for camera_id in settings.active_camera_ids() {
            let tracker = Arc::new(CameraTracker::new(
                camera_id.clone(),
                CustomerRegistry::new(settings.face_confidence, identity_policy(&settings.identity)),
                backend.face_detector(camera_id)?,
                order_signal(&settings, &backend, camera_id)?,
                zones,
            ));
            info!(
                "📷 camera {}: faces={} orders={}",
                camera_id,
                tracker.face_detector_name(),
                tracker.order_signal_name()
            );
            let stream = CameraStream::new(Arc::clone(&tracker), source_opener(&settings, camera_id), period);
            stream.check_source();
            streams.push(stream);
            trackers.push(tracker);
        }

        Ok(Self {
            settings,
            trackers,
            streams,
            board: SnapshotBoard::new(),
            aggregator: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn trackers(&self) -> &[Arc<CameraTracker>] {
        &self.trackers
    }

    pub fn board(&self) -> SnapshotBoard {
        self.board.clone()
    }

    /// 启动所有摄像头与汇总线程; 单路失败不影响其他摄像头
    ///
    /// 返回成功推流的摄像头数。
    pub fn start(&mut self) -> Result<usize> {
        let mut streaming = 0;
        for stream in &mut self.streams {
            match stream.start() {
                Ok(()) => streaming += 1,
                Err(e) => warn!("{}", e),
            }
        }
        if self.aggregator.is_none() {
            let aggregator = Aggregator::new(self.trackers.clone());
            let period = Duration::from_millis(self.settings.aggregate_interval_ms);
            self.aggregator = Some(AggregatorDriver::spawn(aggregator, self.board.clone(), period)?);
        }
        info!("🚀 {}/{} cameras streaming", streaming, self.streams.len());
        Ok(streaming)
    }

    fn stream_mut(&mut self, camera_id: &str) -> Result<&mut CameraStream> {
        self.streams
            .iter_mut()
            .find(|s| s.tracker().camera_id() == camera_id)
            .ok_or_else(|| Error::Config(format!("unknown camera {:?}", camera_id)))
    }

    pub fn start_camera(&mut self, camera_id: &str) -> Result<()> {
        self.stream_mut(camera_id)?.start()
    }

    pub fn stop_camera(&mut self, camera_id: &str) -> Result<()> {
        self.stream_mut(camera_id)?.stop();
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for stream in &mut self.streams {
            stream.stop();
        }
    }

    /// 立即汇总一次 (不经过汇总线程)
    pub fn sample_now(&self) -> Snapshot {
        Aggregator::new(self.trackers.clone()).sample()
    }

    /// 停止汇总与所有摄像头,返回停止前的最后一份快照
    pub fn shutdown(mut self) -> Snapshot {
        if let Some(mut aggregator) = self.aggregator.take() {
            aggregator.stop();
        }
        let last = self.sample_now();
        self.board.publish(last.clone());
        self.stop_all();
        info!("👋 store monitor stopped");
        last
    }
}
