// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod aggregate; // 多路汇总
pub mod config; // 门店监控配置
pub mod detection; // 检测适配器
pub mod error;
pub mod input; // 视频输入系统
pub mod registry; // 顾客登记簿
pub mod systems; // 驱动线程与装配
pub mod tracker; // 单路摄像头跟踪器

pub use crate::aggregate::{Aggregator, CameraReport, Snapshot};
pub use crate::config::Settings;
pub use crate::error::{Error, Result};
pub use crate::registry::{Counters, Customer, CustomerId, CustomerRegistry, OrderCounts, OrderKind};
pub use crate::systems::{SnapshotBoard, StoreMonitor};
pub use crate::tracker::{CameraStatus, CameraTracker, TickReport};

pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    chrono::Local::now().format(&fmt).to_string()
}
