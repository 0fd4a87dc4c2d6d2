/// 视频输入系统 (Video Input System)
///
/// 帧源与打开方式,每路摄像头一个:
/// - ImageSequence: 目录中的图片序列 (离线回放)
/// - SyntheticSource: 合成空白帧 (配合脚本检测器)
pub mod frame;
pub mod image_dir;
pub mod source;
pub mod synthetic;

pub use frame::Frame;
pub use image_dir::{ImageDirOpener, ImageSequence};
pub use source::{FrameSource, SourceOpener};
pub use synthetic::{SyntheticOpener, SyntheticSource};
