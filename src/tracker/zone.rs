//! 区域几何: 入口线与出口线 (占画面高度的比例)
use serde::Serialize;

use crate::detection::Point;
use crate::{Error, Result};

/// 画面中的区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// 入口线以上
    Entrance,
    /// 两条线之间
    Floor,
    /// 出口线以下
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLines {
    entrance: f32,
    exit: f32,
}

impl ZoneLines {
    pub fn new(entrance: f32, exit: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&entrance) || !(0.0..=1.0).contains(&exit) {
            return Err(Error::Config(format!(
                "zone lines must be fractions in [0, 1], got entrance={} exit={}",
                entrance, exit
            )));
        }
        if entrance >= exit {
            return Err(Error::Config(format!(
                "entrance line ({}) must be above exit line ({})",
                entrance, exit
            )));
        }
        Ok(Self { entrance, exit })
    }

    pub fn entrance(&self) -> f32 {
        self.entrance
    }

    pub fn exit(&self) -> f32 {
        self.exit
    }

    /// 两条线在给定画面高度下的像素行
    pub fn rows(&self, height: u32) -> (f32, f32) {
        let h = height as f32;
        (self.entrance * h, self.exit * h)
    }

    pub fn zone_of(&self, point: &Point, height: u32) -> Zone {
        let (entrance_row, exit_row) = self.rows(height);
        if point.y < entrance_row {
            Zone::Entrance
        } else if point.y > exit_row {
            Zone::Exit
        } else {
            Zone::Floor
        }
    }
}

impl Default for ZoneLines {
    fn default() -> Self {
        Self {
            entrance: 0.2,
            exit: 0.8,
        }
    }
}

/// 各区域的在店人数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ZoneOccupancy {
    pub entrance: usize,
    pub floor: usize,
    pub exit: usize,
}

impl ZoneOccupancy {
    pub fn add(&mut self, zone: Zone) {
        match zone {
            Zone::Entrance => self.entrance += 1,
            Zone::Floor => self.floor += 1,
            Zone::Exit => self.exit += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.entrance + self.floor + self.exit
    }
}
