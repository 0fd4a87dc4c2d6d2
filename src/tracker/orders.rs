//! 订单信号
//! Order signals: where coffee/meal order events come from.
//!
//! 分两步执行:
//! 1. `detect` 可失败,在登记簿更新之前运行 (失败则整帧跳过)
//! 2. `attribute` 不可失败,把本帧的订单分配给在店顾客
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::detection::{default_order_kind, OrderDetector, Point};
use crate::input::Frame;
use crate::registry::{CustomerId, OrderKind};
use crate::{Error, Result};

/// 画面中识别到的一笔订单
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSighting {
    pub kind: OrderKind,
    pub at: Point,
}

/// 归属到顾客的订单
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEvent {
    pub customer: CustomerId,
    pub kind: OrderKind,
}

pub trait OrderSignal: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<OrderSighting>>;

    /// `present`: 更新后的在店顾客及位置 (按ID排序)
    fn attribute(
        &mut self,
        sightings: &[OrderSighting],
        present: &[(CustomerId, Option<Point>)],
    ) -> Vec<OrderEvent>;

    fn name(&self) -> &str;
}

// ========== 模拟订单 ==========

/// 每位在店顾客每帧按概率独立产生咖啡/正餐订单
pub struct SimulatedOrders {
    coffee_probability: f64,
    meal_probability: f64,
    rng: StdRng,
}

impl SimulatedOrders {
    pub fn new(coffee_probability: f64, meal_probability: f64, seed: Option<u64>) -> Result<Self> {
        for (name, p) in [("coffee", coffee_probability), ("meal", meal_probability)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!(
                    "{} order probability must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            coffee_probability,
            meal_probability,
            rng,
        })
    }
}

impl OrderSignal for SimulatedOrders {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<OrderSighting>> {
        Ok(Vec::new())
    }

    fn attribute(
        &mut self,
        _sightings: &[OrderSighting],
        present: &[(CustomerId, Option<Point>)],
    ) -> Vec<OrderEvent> {
        let mut events = Vec::new();
        for &(customer, _) in present {
            if self.rng.gen_bool(self.coffee_probability) {
                events.push(OrderEvent {
                    customer,
                    kind: OrderKind::Coffee,
                });
            }
            if self.rng.gen_bool(self.meal_probability) {
                events.push(OrderEvent {
                    customer,
                    kind: OrderKind::Meal,
                });
            }
        }
        events
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// ========== 检测订单 ==========

/// 订单物体检测 → 最近的在店顾客
pub struct DetectedOrders {
    detector: OrderDetector,
    min_confidence: f32,
    /// 为空时使用内置 COCO 标签表
    labels: HashMap<String, OrderKind>,
}

impl DetectedOrders {
    pub fn new(detector: OrderDetector, min_confidence: f32, labels: HashMap<String, OrderKind>) -> Self {
        Self {
            detector,
            min_confidence,
            labels,
        }
    }

    fn kind_of(&self, label: &str) -> Option<OrderKind> {
        if self.labels.is_empty() {
            default_order_kind(label)
        } else {
            self.labels.get(label).copied()
        }
    }
}

impl OrderSignal for DetectedOrders {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<OrderSighting>> {
        let detections = self.detector.detect(frame)?;
        Ok(detections
            .iter()
            .filter(|d| d.confidence > self.min_confidence)
            .filter_map(|d| {
                self.kind_of(&d.label).map(|kind| OrderSighting {
                    kind,
                    at: d.bbox.centroid(),
                })
            })
            .collect())
    }

    fn attribute(
        &mut self,
        sightings: &[OrderSighting],
        present: &[(CustomerId, Option<Point>)],
    ) -> Vec<OrderEvent> {
        sightings
            .iter()
            .filter_map(|sighting| {
                let nearest = present
                    .iter()
                    .filter_map(|(id, pos)| pos.map(|p| (*id, p.distance(&sighting.at))))
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                if nearest.is_none() {
                    debug!("{} order with nobody in store, dropped", sighting.kind);
                }
                nearest.map(|(customer, _)| OrderEvent {
                    customer,
                    kind: sighting.kind,
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        self.detector.name()
    }
}
