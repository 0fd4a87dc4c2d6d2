// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! YOLOv8 订单物体检测器 (ONNX)
//!
//! 输出: [1, 4 + nc, N], 每列 [cx, cy, w, h, cls_0 .. cls_nc]

use std::path::Path;

use image::imageops;
use ndarray::Array4;
use ort::session::Session;
use ort::{inputs, value::Tensor};

use super::adapter::Detect;
use super::types::{non_max_suppression, BBox, OrderDetection};
use crate::input::Frame;
use crate::{Error, Result};

const INPUT_SIZE: u32 = 640;
const CXYWH_OFFSET: usize = 4;

pub struct YoloOrderDetector {
    session: Session,
    conf: f32,
    iou: f32,
}

impl YoloOrderDetector {
    /// 加载模型; 文件不存在时返回 `MissingModel`
    pub fn new(model_path: &Path, conf: f32, iou: f32) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::MissingModel {
                path: model_path.to_path_buf(),
            });
        }

        let session = super::load_session(model_path)?;

        Ok(Self { session, conf, iou })
    }

    fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// 等比缩放到左上角, 其余填充 144/255
    fn preprocess(frame: &Frame) -> (Array4<f32>, f32) {
        let size = INPUT_SIZE as usize;
        let (w0, h0) = frame.image.dimensions();
        let (ratio, w_new, h_new) =
            Self::scale_wh(w0 as f32, h0 as f32, INPUT_SIZE as f32, INPUT_SIZE as f32);
        let img = imageops::resize(
            &frame.image,
            (w_new as u32).max(1),
            (h_new as u32).max(1),
            imageops::FilterType::Triangle,
        );

        let mut ys = Array4::<f32>::from_elem((1, 3, size, size), 144.0 / 255.0);
        for (x, y, rgb) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = rgb.0;
            ys[[0, 0, y, x]] = r as f32 / 255.0;
            ys[[0, 1, y, x]] = g as f32 / 255.0;
            ys[[0, 2, y, x]] = b as f32 / 255.0;
        }
        (ys, ratio)
    }
}

impl Detect for YoloOrderDetector {
    type Output = OrderDetection;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<OrderDetection>> {
        let (blob, ratio) = Self::preprocess(frame);
        let shape: Vec<usize> = blob.shape().to_vec();
        let (data, _offset) = blob.into_raw_vec_and_offset();
        let input = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))?;

        let outputs = self.session.run(inputs![input])?;
        let (out_shape, values) = outputs[0].try_extract_tensor::<f32>()?;

        if out_shape.len() != 3 || (out_shape[1] as usize) <= CXYWH_OFFSET {
            return Err(Error::Detection(format!(
                "unexpected order model output shape {:?}",
                out_shape
            )));
        }
        let channels = out_shape[1] as usize;
        let anchors = out_shape[2] as usize;
        let nc = channels - CXYWH_OFFSET;
        let (w0, h0) = (frame.width() as f32, frame.height() as f32);

        let mut found = Vec::new();
        for i in 0..anchors {
            let at = |c: usize| values[c * anchors + i];

            let (id, confidence) = (0..nc)
                .map(|c| (c, at(CXYWH_OFFSET + c)))
                .fold((0, f32::MIN), |max, x| if x.1 > max.1 { x } else { max });

            if confidence < self.conf {
                continue;
            }

            let cx = at(0) / ratio;
            let cy = at(1) / ratio;
            let w = at(2) / ratio;
            let h = at(3) / ratio;
            let bbox = BBox::from_xywh(
                (cx - w / 2.0).clamp(0.0, w0),
                (cy - h / 2.0).clamp(0.0, h0),
                w,
                h,
            );
            let label = COCO_NAMES
                .get(id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("class_{}", id));
            found.push(OrderDetection::new(label, confidence, bbox));
        }

        non_max_suppression(&mut found, self.iou, |d| (d.bbox, d.confidence));
        Ok(found)
    }

    fn name(&self) -> &str {
        "yolov8-orders"
    }
}

/// COCO 80 类名称
pub const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];
