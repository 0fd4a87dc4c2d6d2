//! 顾客登记簿 (每路摄像头一个)
//! Customer registry: the per-camera set of tracked customers and its counters.
//!
//! 每帧流程:
//! 1. 过滤置信度 (严格大于阈值)
//! 2. 身份策略绑定检测 → 顾客ID
//! 3. 本帧未出现的在店顾客标记离店
//! 4. 进店数 = 历史上创建的顾客总数

pub mod customer;
pub mod identity;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

pub use customer::{Customer, CustomerId, OrderCounts, OrderKind};
pub use identity::{Binding, IdentityPolicy, NearestCentroid, RecencyBinding};

use crate::detection::{Detection, Point};

/// 累计计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counters {
    pub entry_count: u64,
    pub exit_count: u64,
    pub orders: OrderCounts,
}

impl Counters {
    /// 当前在店人数
    pub fn occupancy(&self) -> u64 {
        self.entry_count.saturating_sub(self.exit_count)
    }
}

/// 单次更新的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// 通过置信度过滤的检测数
    pub accepted: usize,
    /// 本帧新建的顾客
    pub minted: Vec<CustomerId>,
    /// 本帧离店的顾客
    pub exited: Vec<CustomerId>,
}

pub struct CustomerRegistry {
    customers: HashMap<CustomerId, Customer>,
    next_id: CustomerId,
    entry_count: u64,
    exit_count: u64,
    order_counts: OrderCounts,
    face_confidence: f32,
    policy: Box<dyn IdentityPolicy>,
}

impl CustomerRegistry {
    pub fn new(face_confidence: f32, policy: Box<dyn IdentityPolicy>) -> Self {
        Self {
            customers: HashMap::new(),
            next_id: 1,
            entry_count: 0,
            exit_count: 0,
            order_counts: OrderCounts::default(),
            face_confidence,
            policy,
        }
    }

    /// 默认的最近分配策略
    pub fn with_recency(face_confidence: f32) -> Self {
        Self::new(face_confidence, Box::new(RecencyBinding))
    }

    /// 处理一帧的人脸检测
    pub fn update(&mut self, detections: &[Detection], now: DateTime<Local>) -> UpdateOutcome {
        let centroids: Vec<Point> = detections
            .iter()
            .filter(|d| d.confidence > self.face_confidence)
            .map(|d| d.bbox.centroid())
            .collect();

        let present = self.in_store();
        let bindings = self.policy.bind(&centroids, &present);
        if bindings.len() != centroids.len() {
            warn!(
                policy = self.policy.name(),
                "policy returned {} bindings for {} detections",
                bindings.len(),
                centroids.len()
            );
        }

        let mut outcome = UpdateOutcome {
            accepted: centroids.len(),
            ..Default::default()
        };
        let mut fresh_slots: HashMap<usize, CustomerId> = HashMap::new();
        let mut touched: HashSet<CustomerId> = HashSet::new();
        let mut bindings = bindings.into_iter();

        for centroid in &centroids {
            let id = match bindings.next() {
                Some(Binding::Existing(id)) if self.is_in_store(id) => id,
                Some(Binding::Fresh(slot)) => match fresh_slots.get(&slot) {
                    Some(&id) => id,
                    None => {
                        let id = self.mint(now);
                        fresh_slots.insert(slot, id);
                        outcome.minted.push(id);
                        id
                    }
                },
                // 无效ID或策略漏掉了该检测,按新顾客处理
                Some(Binding::Existing(_)) | None => {
                    let id = self.mint(now);
                    outcome.minted.push(id);
                    id
                }
            };

            if let Some(customer) = self.customers.get_mut(&id) {
                customer.observe(*centroid, now);
            }
            touched.insert(id);
        }

        for (id, customer) in self.customers.iter_mut() {
            if !touched.contains(id) && customer.mark_exited(now) {
                self.exit_count += 1;
                outcome.exited.push(*id);
            }
        }
        outcome.exited.sort_unstable();

        self.entry_count = self.customers.len() as u64;
        outcome
    }

    fn mint(&mut self, now: DateTime<Local>) -> CustomerId {
        let id = self.next_id;
        self.next_id += 1;
        self.customers.insert(id, Customer::new(id, now));
        id
    }

    fn is_in_store(&self, id: CustomerId) -> bool {
        self.customers.get(&id).is_some_and(|c| c.in_store())
    }

    /// 为在店顾客记录一笔订单; 未知或已离店的顾客返回 false
    pub fn record_order(&mut self, id: CustomerId, kind: OrderKind) -> bool {
        match self.customers.get_mut(&id) {
            Some(customer) if customer.in_store() => {
                customer.add_order(kind);
                self.order_counts.increment(kind);
                true
            }
            _ => false,
        }
    }

    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    /// 全部顾客 (按ID排序)
    pub fn customers(&self) -> Vec<&Customer> {
        let mut all: Vec<&Customer> = self.customers.values().collect();
        all.sort_by_key(|c| c.id());
        all
    }

    /// 在店顾客及其最后位置 (按ID排序)
    pub fn in_store(&self) -> Vec<(CustomerId, Option<Point>)> {
        let mut present: Vec<(CustomerId, Option<Point>)> = self
            .customers
            .values()
            .filter(|c| c.in_store())
            .map(|c| (c.id(), c.position()))
            .collect();
        present.sort_by_key(|(id, _)| *id);
        present
    }

    pub fn counters(&self) -> Counters {
        Counters {
            entry_count: self.entry_count,
            exit_count: self.exit_count,
            orders: self.order_counts,
        }
    }

    pub fn face_confidence(&self) -> f32 {
        self.face_confidence
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;
    use chrono::Duration;

    fn det(x: f32, y: f32, confidence: f32) -> Detection {
        Detection::new(BBox::new(x - 10.0, y - 10.0, x + 10.0, y + 10.0), confidence)
    }

    fn assert_exit_invariant(registry: &CustomerRegistry) {
        for c in registry.customers() {
            assert_eq!(c.exit_time().is_some(), !c.in_store(), "customer {}", c.id());
            assert!(c.entry_time() <= c.last_seen());
            if let Some(exit) = c.exit_time() {
                assert!(exit >= c.last_seen());
            }
        }
        let counters = registry.counters();
        assert!(counters.exit_count <= counters.entry_count);
    }

    /// 只绑定第一个检测的策略
    struct FirstOnly;

    impl IdentityPolicy for FirstOnly {
        fn bind(&mut self, centroids: &[Point], _present: &[(CustomerId, Option<Point>)]) -> Vec<Binding> {
            centroids.iter().take(1).map(|_| Binding::Fresh(0)).collect()
        }

        fn name(&self) -> &'static str {
            "first-only"
        }
    }

    #[test]
    fn detections_without_a_binding_become_new_customers() {
        let mut registry = CustomerRegistry::new(0.7, Box::new(FirstOnly));
        let outcome = registry.update(
            &[det(10.0, 10.0, 0.9), det(100.0, 100.0, 0.9), det(200.0, 200.0, 0.9)],
            Local::now(),
        );

        assert_eq!(outcome.accepted, 3);
        assert_eq!(outcome.minted, vec![1, 2, 3]);
        assert_eq!(registry.counters().entry_count, 3);
        assert_eq!(registry.customer(3).unwrap().position(), Some(Point::new(200.0, 200.0)));
        assert_exit_invariant(&registry);
    }

    #[test]
    fn first_detection_creates_a_customer() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let outcome = registry.update(&[det(50.0, 50.0, 0.9)], Local::now());

        assert_eq!(outcome.minted, vec![1]);
        assert_eq!(registry.counters().entry_count, 1);
        let customer = registry.customer(1).unwrap();
        assert!(customer.in_store());
        assert_eq!(customer.position(), Some(Point::new(50.0, 50.0)));
        assert_exit_invariant(&registry);
    }

    #[test]
    fn absent_customer_exits() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let t0 = Local::now();
        registry.update(&[det(50.0, 50.0, 0.9)], t0);
        let outcome = registry.update(&[], t0 + Duration::milliseconds(30));

        assert_eq!(outcome.exited, vec![1]);
        let customer = registry.customer(1).unwrap();
        assert!(!customer.in_store());
        assert_eq!(customer.exit_time(), Some(t0 + Duration::milliseconds(30)));
        assert_eq!(registry.counters().exit_count, 1);
        assert_exit_invariant(&registry);
    }

    #[test]
    fn confidence_at_threshold_is_excluded() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let outcome = registry.update(&[det(50.0, 50.0, 0.7), det(5.0, 5.0, 0.0)], Local::now());

        assert_eq!(outcome.accepted, 0);
        assert!(registry.customers().is_empty());
        assert_eq!(registry.counters(), Counters::default());
    }

    #[test]
    fn recency_mints_one_customer_per_tick() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let t0 = Local::now();
        let outcome = registry.update(
            &[det(10.0, 10.0, 0.9), det(200.0, 200.0, 0.95), det(400.0, 50.0, 0.8)],
            t0,
        );
        assert_eq!(outcome.accepted, 3);
        assert_eq!(outcome.minted, vec![1]);
        // 最后一个检测的位置
        assert_eq!(registry.customer(1).unwrap().position(), Some(Point::new(400.0, 50.0)));

        // 下一帧同一个人仍在画面中: 基线策略会产生新ID,旧ID离店
        let outcome = registry.update(&[det(400.0, 50.0, 0.9)], t0 + Duration::milliseconds(30));
        assert_eq!(outcome.minted, vec![2]);
        assert_eq!(outcome.exited, vec![1]);
        assert_eq!(registry.counters().entry_count, 2);
        assert_eq!(registry.counters().occupancy(), 1);
        assert_exit_invariant(&registry);
    }

    #[test]
    fn empty_ticks_without_customers_change_nothing() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let t0 = Local::now();
        registry.update(&[det(1.0, 1.0, 0.9)], t0);
        registry.update(&[], t0);
        let before = registry.counters();
        for i in 1..5 {
            let outcome = registry.update(&[], t0 + Duration::seconds(i));
            assert_eq!(outcome, UpdateOutcome::default());
            assert_eq!(registry.counters(), before);
        }
        assert_exit_invariant(&registry);
    }

    #[test]
    fn counters_are_monotonic_across_ticks() {
        let mut registry = CustomerRegistry::new(0.5, Box::new(NearestCentroid::new(40.0)));
        let t0 = Local::now();
        let script: Vec<Vec<Detection>> = vec![
            vec![det(10.0, 10.0, 0.9)],
            vec![det(15.0, 12.0, 0.9), det(300.0, 300.0, 0.9)],
            vec![det(305.0, 298.0, 0.9)],
            vec![],
            vec![det(20.0, 20.0, 0.6)],
        ];

        let mut last = registry.counters();
        for (i, tick) in script.iter().enumerate() {
            registry.update(tick, t0 + Duration::milliseconds(30 * i as i64));
            let now = registry.counters();
            assert!(now.entry_count >= last.entry_count);
            assert!(now.exit_count >= last.exit_count);
            assert_exit_invariant(&registry);
            last = now;
        }
        assert_eq!(last.entry_count, 3);
        assert_eq!(last.exit_count, 2);
    }

    #[test]
    fn nearest_centroid_keeps_ids_for_moving_people() {
        let mut registry = CustomerRegistry::new(0.7, Box::new(NearestCentroid::new(40.0)));
        let t0 = Local::now();
        registry.update(&[det(100.0, 100.0, 0.9), det(400.0, 100.0, 0.9)], t0);
        for step in 1..10 {
            let dx = step as f32 * 5.0;
            let outcome = registry.update(
                &[det(100.0 + dx, 100.0, 0.9), det(400.0 - dx, 100.0, 0.9)],
                t0 + Duration::milliseconds(30 * step),
            );
            assert!(outcome.minted.is_empty());
            assert!(outcome.exited.is_empty());
        }
        assert_eq!(registry.counters().entry_count, 2);
        assert_eq!(registry.customer(1).unwrap().position(), Some(Point::new(145.0, 100.0)));
        assert_eq!(registry.policy_name(), "nearest_centroid");
    }

    #[test]
    fn orders_only_recorded_for_present_customers() {
        let mut registry = CustomerRegistry::with_recency(0.7);
        let t0 = Local::now();
        registry.update(&[det(1.0, 1.0, 0.9)], t0);

        assert!(registry.record_order(1, OrderKind::Coffee));
        assert!(registry.record_order(1, OrderKind::Coffee));
        assert!(registry.record_order(1, OrderKind::Meal));
        assert!(!registry.record_order(42, OrderKind::Meal));

        registry.update(&[], t0 + Duration::seconds(1));
        assert!(!registry.record_order(1, OrderKind::Coffee));

        let customer = registry.customer(1).unwrap();
        assert_eq!(customer.orders().get(OrderKind::Coffee), 2);
        assert_eq!(customer.orders().get(OrderKind::Meal), 1);
        assert_eq!(registry.counters().orders, *customer.orders());
    }
}
