//! 顾客实体
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::detection::Point;

/// 顾客ID (单个登记簿内唯一,单调递增,不复用)
pub type CustomerId = u64;

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Coffee,
    Meal,
}

impl OrderKind {
    pub const ALL: [OrderKind; 2] = [OrderKind::Coffee, OrderKind::Meal];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Coffee => "coffee",
            OrderKind::Meal => "meal",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 各类订单计数 (只增不减)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderCounts {
    pub coffee: u64,
    pub meal: u64,
}

impl OrderCounts {
    pub fn get(&self, kind: OrderKind) -> u64 {
        match kind {
            OrderKind::Coffee => self.coffee,
            OrderKind::Meal => self.meal,
        }
    }

    pub fn total(&self) -> u64 {
        self.coffee + self.meal
    }

    pub(crate) fn increment(&mut self, kind: OrderKind) {
        match kind {
            OrderKind::Coffee => self.coffee += 1,
            OrderKind::Meal => self.meal += 1,
        }
    }

    /// 逐类累加
    pub fn accumulate(&mut self, other: &OrderCounts) {
        self.coffee += other.coffee;
        self.meal += other.meal;
    }
}

/// 单个被跟踪的顾客
///
/// 字段只能由所属的 `CustomerRegistry` 修改。
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    id: CustomerId,
    entry_time: DateTime<Local>,
    exit_time: Option<DateTime<Local>>,
    orders: OrderCounts,
    last_seen: DateTime<Local>,
    in_store: bool,
    position: Option<Point>,
}

impl Customer {
    pub(crate) fn new(id: CustomerId, now: DateTime<Local>) -> Self {
        Self {
            id,
            entry_time: now,
            exit_time: None,
            orders: OrderCounts::default(),
            last_seen: now,
            in_store: true,
            position: None,
        }
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn entry_time(&self) -> DateTime<Local> {
        self.entry_time
    }

    pub fn exit_time(&self) -> Option<DateTime<Local>> {
        self.exit_time
    }

    pub fn orders(&self) -> &OrderCounts {
        &self.orders
    }

    pub fn last_seen(&self) -> DateTime<Local> {
        self.last_seen
    }

    pub fn in_store(&self) -> bool {
        self.in_store
    }

    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// 本帧匹配到检测
    pub(crate) fn observe(&mut self, position: Point, now: DateTime<Local>) {
        self.position = Some(position);
        // 乱序时间戳不回退
        self.last_seen = self.last_seen.max(now);
    }

    /// 标记离店; 只在第一次调用时生效
    pub(crate) fn mark_exited(&mut self, now: DateTime<Local>) -> bool {
        if !self.in_store {
            return false;
        }
        self.in_store = false;
        self.exit_time = Some(now.max(self.last_seen));
        true
    }

    pub(crate) fn add_order(&mut self, kind: OrderKind) {
        self.orders.increment(kind);
    }
}
