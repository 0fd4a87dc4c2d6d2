//! 检测类别 → 订单类型 的默认映射
use phf::phf_map;

use crate::registry::OrderKind;

/// 默认订单标签表 (COCO 类别名)
pub static DEFAULT_ORDER_LABELS: phf::Map<&'static str, OrderKind> = phf_map! {
    "cup" => OrderKind::Coffee,
    "wine glass" => OrderKind::Coffee,
    "bottle" => OrderKind::Coffee,
    "coffee" => OrderKind::Coffee,
    "bowl" => OrderKind::Meal,
    "sandwich" => OrderKind::Meal,
    "hot dog" => OrderKind::Meal,
    "pizza" => OrderKind::Meal,
    "donut" => OrderKind::Meal,
    "cake" => OrderKind::Meal,
    "meal" => OrderKind::Meal,
};

/// 查询默认映射
pub fn default_order_kind(label: &str) -> Option<OrderKind> {
    DEFAULT_ORDER_LABELS.get(label).copied()
}
