//! 摄像头驱动线程
//! One thread per camera: read a frame every period and feed it to the tracker.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::input::{FrameSource, SourceOpener};
use crate::tracker::{CameraStatus, CameraTracker};
use crate::{Error, Result};

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// 单路摄像头的推流控制
pub struct CameraStream {
    tracker: Arc<CameraTracker>,
    opener: Box<dyn SourceOpener>,
    period: Duration,
    worker: Option<Worker>,
}

impl CameraStream {
    pub fn new(tracker: Arc<CameraTracker>, opener: Box<dyn SourceOpener>, period: Duration) -> Self {
        Self {
            tracker,
            opener,
            period,
            worker: None,
        }
    }

    pub fn tracker(&self) -> &Arc<CameraTracker> {
        &self.tracker
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// 启动前检查帧源; 不可用时标记为 `NotDetected`
    pub fn check_source(&self) -> bool {
        if self.worker.is_some() {
            return true;
        }
        match self.opener.check_available() {
            Ok(()) => {
                self.tracker.set_status(CameraStatus::Idle);
                true
            }
            Err(e) => {
                self.tracker.set_status(CameraStatus::NotDetected);
                warn!("📷 camera {} not detected ({}): {}", self.tracker.camera_id(), self.opener.describe(), e);
                false
            }
        }
    }

    /// 打开帧源并启动驱动线程; 已在运行时直接返回
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let camera = self.tracker.camera_id().to_string();

        let source = match self.opener.open() {
            Ok(source) => source,
            Err(e) => {
                self.tracker.set_status(CameraStatus::Unavailable);
                warn!("❌ camera {} unavailable ({}): {}", camera, self.opener.describe(), e);
                return Err(Error::CameraUnavailable {
                    camera,
                    reason: e.to_string(),
                });
            }
        };

        self.tracker.set_status(CameraStatus::Streaming);
        let (stop_tx, stop_rx) = bounded(1);
        let tracker = Arc::clone(&self.tracker);
        let period = self.period;
        let spawned = thread::Builder::new()
            .name(format!("camera-{}", camera))
            .spawn(move || drive(tracker, source, period, stop_rx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.tracker.set_status(CameraStatus::Idle);
                return Err(e.into());
            }
        };

        info!("🎬 camera {} streaming from {}", camera, self.opener.describe());
        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    /// 停止推流: 等待进行中的一帧完成,释放帧源,保留登记簿
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("camera {} driver panicked", self.tracker.camera_id());
        }
        self.tracker.set_status(CameraStatus::Idle);
        info!("⏹️ camera {} stopped", self.tracker.camera_id());
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive(tracker: Arc<CameraTracker>, mut source: Box<dyn FrameSource>, period: Duration, stop_rx: Receiver<()>) {
    let ticker = tick(period);
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => match source.read_next() {
                Ok(Some(frame)) => {
                    // 检测失败已在跟踪器内记录
                    if let Err(e) = tracker.on_frame(&frame) {
                        debug!(camera = %tracker.camera_id(), "tick skipped: {}", e);
                    }
                }
                Ok(None) => debug!(camera = %tracker.camera_id(), "no frame this tick"),
                Err(e) => warn!(camera = %tracker.camera_id(), "frame read failed: {}", e),
            },
        }
    }
    drop(source);
}
