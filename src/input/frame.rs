//! 视频帧
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};

/// 已解码帧 (采集 → 跟踪器)
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    /// 帧序号 (每路摄像头独立计数)
    pub index: u64,
    /// 采集时间
    pub timestamp: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image,
            index,
            timestamp: Local::now(),
        }
    }

    /// 纯色空白帧
    pub fn blank(width: u32, height: u32, index: u64) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])), index)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
