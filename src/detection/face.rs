// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! SSD 人脸检测器 (res10_300x300, ONNX)
//!
//! 输入: [1, 3, 300, 300] BGR, 减均值 (104, 177, 123)
//! 输出: [1, 1, N, 7] -> [image_id, label, conf, x1, y1, x2, y2] (归一化坐标)

use std::path::Path;

use image::imageops;
use ndarray::Array4;
use ort::session::Session;
use ort::{inputs, value::Tensor};

use super::adapter::Detect;
use super::types::{BBox, Detection};
use crate::input::Frame;
use crate::{Error, Result};

const INPUT_SIZE: u32 = 300;
const MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];
const ROW: usize = 7;

pub struct SsdFaceDetector {
    session: Session,
}

impl SsdFaceDetector {
    /// 加载模型; 文件不存在时返回 `MissingModel`
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::MissingModel {
                path: model_path.to_path_buf(),
            });
        }

        let session = super::load_session(model_path)?;

        Ok(Self { session })
    }

    fn preprocess(frame: &Frame) -> Array4<f32> {
        let resized = imageops::resize(
            &frame.image,
            INPUT_SIZE,
            INPUT_SIZE,
            imageops::FilterType::Triangle,
        );

        let size = INPUT_SIZE as usize;
        let mut blob = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, rgb) in resized.enumerate_pixels() {
            let [r, g, b] = rgb.0;
            let (x, y) = (x as usize, y as usize);
            blob[[0, 0, y, x]] = b as f32 - MEAN_BGR[0];
            blob[[0, 1, y, x]] = g as f32 - MEAN_BGR[1];
            blob[[0, 2, y, x]] = r as f32 - MEAN_BGR[2];
        }
        blob
    }
}

impl Detect for SsdFaceDetector {
    type Output = Detection;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let blob = Self::preprocess(frame);
        let shape: Vec<usize> = blob.shape().to_vec();
        let (data, _offset) = blob.into_raw_vec_and_offset();
        let input = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))?;

        let outputs = self.session.run(inputs![input])?;
        let (out_shape, values) = outputs[0].try_extract_tensor::<f32>()?;

        if out_shape.len() != 4 || out_shape[3] as usize != ROW {
            return Err(Error::Detection(format!(
                "unexpected face model output shape {:?}",
                out_shape
            )));
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let detections = values
            .chunks_exact(ROW)
            .map(|row| {
                let bbox = BBox::new(
                    (row[3] * w).clamp(0.0, w),
                    (row[4] * h).clamp(0.0, h),
                    (row[5] * w).clamp(0.0, w),
                    (row[6] * h).clamp(0.0, h),
                );
                Detection::new(bbox, row[2])
            })
            .collect();

        Ok(detections)
    }

    fn name(&self) -> &str {
        "ssd-res10-face"
    }
}
