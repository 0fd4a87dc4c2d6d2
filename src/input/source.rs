//! 帧源接口
//! Frame source boundary: opening a stream and pulling frames from it.
use super::Frame;
use crate::Result;

/// 已打开的帧源
///
/// `Ok(None)` 或 `Err` 表示本周期没有可用帧,由调用方跳过本帧。
pub trait FrameSource: Send {
    fn read_next(&mut self) -> Result<Option<Frame>>;
}

/// 帧源工厂
///
/// 每次 `start` 都会重新打开; 打开失败即摄像头不可用。
pub trait SourceOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;

    /// 检查帧源能否打开 (打开后立即释放)
    fn check_available(&self) -> Result<()> {
        self.open().map(drop)
    }

    /// 用于日志的描述
    fn describe(&self) -> String;
}
