//! 检测适配器统一接口
//! One capability, `detect(frame) -> detections`, shared by face and order detectors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{Detection, OrderDetection};
use crate::input::Frame;
use crate::{Error, Result};

/// 检测器 Trait
///
/// 跟踪器只依赖此接口,具体模型 (ONNX/脚本回放) 可替换。
pub trait Detect: Send {
    type Output;

    /// 对单帧执行检测; 失败时本帧被跳过
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Self::Output>>;

    /// 检测器名称 (日志用)
    fn name(&self) -> &str;
}

/// 人脸检测器
pub type FaceDetector = Box<dyn Detect<Output = Detection>>;

/// 订单物体检测器
pub type OrderDetector = Box<dyn Detect<Output = OrderDetection>>;

// ========== 脚本回放检测器 ==========

/// 按预先录制的结果逐帧回放的检测器
pub struct ScriptedDetector<T> {
    name: String,
    ticks: Vec<Vec<T>>,
    cursor: usize,
    looped: bool,
}

impl<T: Clone + Send> ScriptedDetector<T> {
    pub fn new(name: impl Into<String>, ticks: Vec<Vec<T>>, looped: bool) -> Self {
        Self {
            name: name.into(),
            ticks,
            cursor: 0,
            looped,
        }
    }

    /// 每帧都返回同样的结果
    pub fn repeating(name: impl Into<String>, tick: Vec<T>) -> Self {
        Self::new(name, vec![tick], true)
    }
}

impl<T: Clone + Send> Detect for ScriptedDetector<T> {
    type Output = T;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<T>> {
        if self.cursor >= self.ticks.len() {
            if !self.looped || self.ticks.is_empty() {
                return Ok(Vec::new());
            }
            self.cursor = 0;
        }
        let tick = self.ticks[self.cursor].clone();
        self.cursor += 1;
        Ok(tick)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 单路摄像头的检测脚本
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CameraScript {
    #[serde(default)]
    pub faces: Vec<Vec<Detection>>,
    #[serde(default)]
    pub orders: Vec<Vec<OrderDetection>>,
}

/// 检测脚本文件 (JSON)
///
/// ```json
/// { "looped": true,
///   "cameras": { "0": { "faces": [[{"bbox": {"x1":0,"y1":0,"x2":10,"y2":10}, "confidence": 0.9}]] } } }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionScript {
    #[serde(default)]
    pub looped: bool,
    #[serde(default)]
    pub cameras: HashMap<String, CameraScript>,
}

impl DetectionScript {
    /// 加载脚本; 文件缺失与模型缺失同等处理 (启动致命)
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingModel {
                path: path.to_path_buf(),
            });
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn face_detector(&self, camera_id: &str) -> ScriptedDetector<Detection> {
        let faces = self
            .cameras
            .get(camera_id)
            .map(|c| c.faces.clone())
            .unwrap_or_default();
        ScriptedDetector::new(format!("scripted-faces:{}", camera_id), faces, self.looped)
    }

    pub fn order_detector(&self, camera_id: &str) -> ScriptedDetector<OrderDetection> {
        let orders = self
            .cameras
            .get(camera_id)
            .map(|c| c.orders.clone())
            .unwrap_or_default();
        ScriptedDetector::new(format!("scripted-orders:{}", camera_id), orders, self.looped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    fn face(confidence: f32) -> Detection {
        Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), confidence)
    }

    #[test]
    fn scripted_detector_replays_then_goes_quiet() {
        let frame = Frame::blank(4, 4, 0);
        let mut det = ScriptedDetector::new("t", vec![vec![face(0.9)], vec![]], false);
        assert_eq!(det.detect(&frame).unwrap().len(), 1);
        assert!(det.detect(&frame).unwrap().is_empty());
        assert!(det.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn looped_script_restarts() {
        let frame = Frame::blank(4, 4, 0);
        let mut det = ScriptedDetector::repeating("t", vec![face(0.8), face(0.9)]);
        for _ in 0..3 {
            assert_eq!(det.detect(&frame).unwrap().len(), 2);
        }
    }

    #[test]
    fn script_parses_and_builds_per_camera_detectors() {
        let json = r#"{
            "looped": false,
            "cameras": {
                "0": {
                    "faces": [[{"bbox": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}, "confidence": 0.9}]],
                    "orders": [[{"label": "cup", "confidence": 0.8, "bbox": {"x1": 1, "y1": 1, "x2": 2, "y2": 2}}]]
                }
            }
        }"#;
        let script: DetectionScript = serde_json::from_str(json).unwrap();
        let frame = Frame::blank(4, 4, 0);

        let mut faces = script.face_detector("0");
        assert_eq!(faces.detect(&frame).unwrap()[0].confidence, 0.9);

        let mut orders = script.order_detector("0");
        assert_eq!(orders.detect(&frame).unwrap()[0].label, "cup");

        let mut unknown = script.face_detector("7");
        assert!(unknown.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn missing_script_is_fatal() {
        let err = DetectionScript::load(Path::new("/no/such/script.json")).unwrap_err();
        assert!(err.is_fatal());
    }
}
