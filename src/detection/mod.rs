/// 检测系统 (Detection System)
///
/// 统一的检测适配器接口 `Detect`,两种输出:
/// - 人脸检测: `Detection` (检测框 + 置信度)
/// - 订单检测: `OrderDetection` (类别 + 置信度 + 检测框)
///
/// ONNX 模型实现需启用 `onnx` 功能
pub mod adapter;
pub mod labels;
pub mod types;

#[cfg(feature = "onnx")]
pub mod face;
#[cfg(feature = "onnx")]
pub mod order;

pub use adapter::{CameraScript, Detect, DetectionScript, FaceDetector, OrderDetector, ScriptedDetector};
pub use labels::default_order_kind;
pub use types::{non_max_suppression, BBox, Detection, OrderDetection, Point};

#[cfg(feature = "onnx")]
pub use face::SsdFaceDetector;
#[cfg(feature = "onnx")]
pub use order::YoloOrderDetector;

/// 加载 ONNX 模型会话
#[cfg(feature = "onnx")]
pub(crate) fn load_session(model_path: &std::path::Path) -> Result<ort::session::Session, ort::Error> {
    use ort::session::{builder::GraphOptimizationLevel, Session};

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;
    Ok(session)
}
