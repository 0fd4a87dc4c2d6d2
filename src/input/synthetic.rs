//! 合成帧源 - 固定尺寸的空白帧,配合脚本检测器离线运行
use super::source::{FrameSource, SourceOpener};
use super::Frame;
use crate::Result;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        let frame = Frame::blank(self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

pub struct SyntheticOpener {
    width: u32,
    height: u32,
}

impl SyntheticOpener {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl SourceOpener for SyntheticOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource::new(self.width, self.height)))
    }

    fn describe(&self) -> String {
        format!("synthetic:{}x{}", self.width, self.height)
    }
}
