//! 快照发布板 + 汇总线程
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, Snapshot};
use crate::Result;

#[derive(Default)]
struct BoardInner {
    latest: Mutex<Option<Snapshot>>,
    subscribers: Mutex<Vec<Sender<Snapshot>>>,
}

/// 最新快照 (轮询) 与订阅 (推送)
///
/// 订阅通道有界,消费者跟不上时丢弃新快照而不是阻塞汇总线程。
#[derive(Clone, Default)]
pub struct SnapshotBoard {
    inner: Arc<BoardInner>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self, capacity: usize) -> Receiver<Snapshot> {
        let (tx, rx) = bounded(capacity.max(1));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, snapshot: Snapshot) {
        let mut subscribers = self.inner.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("subscriber lagging, snapshot dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        drop(subscribers);

        *self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

const FOLLOW_POLL: Duration = Duration::from_millis(200);

/// 逐个处理订阅到的快照,直到收到停止信号、到达截止时间或订阅关闭
///
/// 停止通道的发送端被丢弃也视为停止。
pub fn follow<E>(
    snapshots: &Receiver<Snapshot>,
    stop: &Receiver<()>,
    deadline: Option<Instant>,
    mut on_snapshot: impl FnMut(Snapshot) -> std::result::Result<(), E>,
) -> std::result::Result<(), E> {
    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => left.min(FOLLOW_POLL),
                _ => return Ok(()),
            },
            None => FOLLOW_POLL,
        };
        select! {
            recv(stop) -> _ => {
                info!("🛑 stop requested");
                return Ok(());
            }
            recv(snapshots) -> msg => match msg {
                Ok(snapshot) => on_snapshot(snapshot)?,
                Err(_) => return Ok(()),
            },
            default(wait) => {}
        }
    }
}

/// 周期汇总线程
pub struct AggregatorDriver {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl AggregatorDriver {
    /// 启动后立即发布一次,之后每 `period` 发布一次
    pub fn spawn(aggregator: Aggregator, board: SnapshotBoard, period: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("aggregator".into())
            .spawn(move || {
                let ticker = tick(period);
                board.publish(aggregator.sample());
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => board.publish(aggregator.sample()),
                    }
                }
            })?;
        info!("📊 aggregator running every {:?}", period);
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(());
            if handle.join().is_err() {
                warn!("aggregator thread panicked");
            }
        }
    }
}

impl Drop for AggregatorDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
