//! 门店监控配置 - 通过JSON文件调整参数

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::registry::OrderKind;
use crate::{Error, Result};

/// 身份绑定策略
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum IdentitySettings {
    /// 每帧共享一个新ID
    Recency,
    /// 按中心点距离匹配 (像素)
    NearestCentroid { max_distance: f32 },
}

/// 订单信号来源
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OrderSettings {
    Simulated {
        coffee_probability: f64,
        meal_probability: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    /// `labels` 为空时使用内置 COCO 标签表
    Detected {
        #[serde(default)]
        labels: HashMap<String, OrderKind>,
    },
}

/// 检测后端
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DetectorSettings {
    /// ONNX 模型 (需 `onnx` 功能); 订单模型只在 `orders.mode = detected` 时加载
    Onnx { face_model: PathBuf, order_model: PathBuf },
    /// JSON 检测脚本回放
    Scripted { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// 门店监控参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === 摄像头 ===
    pub camera_ids: Vec<String>,  // 摄像头ID,每个对应 frames_root 下的一个目录
    pub max_cameras: usize,       // 最多同时运行的摄像头数
    pub frame_size: FrameSize,    // 合成帧尺寸
    pub frames_root: PathBuf,     // 图片序列根目录
    pub loop_frames: bool,        // 图片序列循环播放
    pub synthetic: bool,          // 使用合成空白帧

    // === 检测 ===
    pub face_confidence: f32,  // 人脸置信度阈值 (严格大于)
    pub order_confidence: f32, // 订单置信度阈值 (严格大于)
    pub entrance_line: f32,    // 入口线 (画面高度比例)
    pub exit_line: f32,        // 出口线 (画面高度比例)

    // === 周期 ===
    pub refresh_rate_ms: u64,       // 每路摄像头处理周期
    pub aggregate_interval_ms: u64, // 汇总周期

    pub identity: IdentitySettings,
    pub orders: OrderSettings,
    pub detector: DetectorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_ids: (0..4).map(|i| i.to_string()).collect(),
            max_cameras: 4,
            frame_size: FrameSize {
                width: 640,
                height: 480,
            },
            frames_root: PathBuf::from("frames"),
            loop_frames: true,
            synthetic: false,

            face_confidence: 0.7,
            order_confidence: 0.6,
            entrance_line: 0.2,
            exit_line: 0.8,

            refresh_rate_ms: 30,
            aggregate_interval_ms: 1000,

            identity: IdentitySettings::Recency,
            orders: OrderSettings::Simulated {
                coffee_probability: 0.05,
                meal_probability: 0.03,
                seed: None,
            },
            detector: DetectorSettings::Onnx {
                face_model: PathBuf::from("models/res10_300x300_ssd.onnx"),
                order_model: PathBuf::from("models/yolov8n.onnx"),
            },
        }
    }
}

impl Settings {
    /// 从JSON文件加载配置; 文件不存在时写入默认配置
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("📝 配置文件不存在,创建默认配置: {}", path.display());
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }
        let json = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        info!("✅ 配置已从 {} 加载", path.display());
        Ok(settings)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be in [0, 1], got {}", name, v)))
            }
        };
        fraction("face_confidence", self.face_confidence)?;
        fraction("order_confidence", self.order_confidence)?;
        fraction("entrance_line", self.entrance_line)?;
        fraction("exit_line", self.exit_line)?;
        if self.entrance_line >= self.exit_line {
            return Err(Error::Config(format!(
                "entrance_line ({}) must be less than exit_line ({})",
                self.entrance_line, self.exit_line
            )));
        }
        if self.refresh_rate_ms == 0 || self.aggregate_interval_ms == 0 {
            return Err(Error::Config("refresh_rate_ms and aggregate_interval_ms must be > 0".into()));
        }
        if self.camera_ids.is_empty() || self.max_cameras == 0 {
            return Err(Error::Config("at least one camera must be configured".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.camera_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(Error::Config(format!("duplicate camera id {:?}", dup)));
        }
        if self.synthetic && (self.frame_size.width == 0 || self.frame_size.height == 0) {
            return Err(Error::Config("frame_size must be non-zero".into()));
        }
        if let IdentitySettings::NearestCentroid { max_distance } = self.identity {
            if max_distance.is_nan() || max_distance <= 0.0 {
                return Err(Error::Config(format!("max_distance must be > 0, got {}", max_distance)));
            }
        }
        if let OrderSettings::Simulated {
            coffee_probability,
            meal_probability,
            ..
        } = self.orders
        {
            for (name, p) in [("coffee_probability", coffee_probability), ("meal_probability", meal_probability)] {
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::Config(format!("{} must be in [0, 1], got {}", name, p)));
                }
            }
        }
        Ok(())
    }

    /// 实际启用的摄像头 (超出 `max_cameras` 的被丢弃)
    pub fn active_camera_ids(&self) -> &[String] {
        if self.camera_ids.len() > self.max_cameras {
            warn!(
                "⚠️ {} cameras configured, only the first {} are used",
                self.camera_ids.len(),
                self.max_cameras
            );
            &self.camera_ids[..self.max_cameras]
        } else {
            &self.camera_ids
        }
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️ 当前门店监控配置:");
        info!("  摄像头: {:?} (最多 {})", self.camera_ids, self.max_cameras);
        if self.synthetic {
            info!("  帧源: 合成帧 {}x{}", self.frame_size.width, self.frame_size.height);
        } else {
            info!("  帧源: {} (循环: {})", self.frames_root.display(), self.loop_frames);
        }
        info!(
            "  人脸置信度: {:.2}  订单置信度: {:.2}",
            self.face_confidence, self.order_confidence
        );
        info!("  入口线: {:.2}  出口线: {:.2}", self.entrance_line, self.exit_line);
        info!(
            "  处理周期: {}ms  汇总周期: {}ms",
            self.refresh_rate_ms, self.aggregate_interval_ms
        );
        info!("  身份策略: {:?}", self.identity);
        info!("  订单信号: {:?}", self.orders);
        info!("  检测后端: {:?}", self.detector);
    }
}
