//! 错误类型
//! Error types shared by registries, trackers, adapters and drivers.
//!
//! 错误分级:
//! - 启动致命: `MissingModel` (模型文件缺失,进程不启动)
//! - 单路可恢复: `CameraUnavailable` (摄像头无法打开,其他摄像头不受影响)
//! - 单帧可恢复: `Frame` / `Detection` (跳过本帧,状态保持不变)

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// 模型文件缺失
    #[error("missing model artifact: {} (download the model or fix the path in the config)", path.display())]
    MissingModel { path: PathBuf },

    /// 摄像头无法打开
    #[error("camera {camera} unavailable: {reason}")]
    CameraUnavailable { camera: String, reason: String },

    /// 摄像头未处于推流状态
    #[error("camera {camera} is not streaming")]
    NotStreaming { camera: String },

    /// 读帧/解码失败
    #[error("frame error: {0}")]
    Frame(String),

    /// 检测适配器失败
    #[error("detection failed: {0}")]
    Detection(String),

    /// 配置非法
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "onnx")]
    #[error(transparent)]
    Onnx(#[from] ort::Error),
}

impl Error {
    /// 是否为启动致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingModel { .. } | Error::Config(_))
    }
}
