//! 图片序列输入 - 按文件名顺序读取目录中的图片作为视频帧
//!
//! 每路摄像头对应一个目录,用于离线回放录制好的帧。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::source::{FrameSource, SourceOpener};
use super::Frame;
use crate::{Error, Result};

/// 图片序列帧源
pub struct ImageSequence {
    files: Vec<PathBuf>,
    cursor: usize,
    looped: bool,
    frame_index: u64,
}

impl ImageSequence {
    /// 打开目录; 目录不存在或不含图片时返回错误
    pub fn open(dir: &Path, looped: bool) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && image::ImageFormat::from_path(path).is_ok())
            .collect();

        if files.is_empty() {
            return Err(Error::Frame(format!(
                "no image files in {}",
                dir.display()
            )));
        }
        files.sort();

        debug!("🎞️ 图片序列 {}: {} 帧", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: 0,
            looped,
            frame_index: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.files.len() {
            if !self.looped {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;

        // 解码失败只影响本帧
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::new(image, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// 图片目录帧源工厂
pub struct ImageDirOpener {
    dir: PathBuf,
    looped: bool,
}

impl ImageDirOpener {
    pub fn new(dir: impl Into<PathBuf>, looped: bool) -> Self {
        Self {
            dir: dir.into(),
            looped,
        }
    }
}

impl SourceOpener for ImageDirOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(ImageSequence::open(&self.dir, self.looped)?))
    }

    fn describe(&self) -> String {
        format!("images:{}", self.dir.display())
    }
}
