//! 身份绑定策略
//! Identity policies: how a tick's detections are bound to customer ids.
//!
//! - `RecencyBinding`: 默认策略。同一帧内所有检测共享一个新ID
//!   (绑定的是检测"槽位"而不是具体的人; 多人同框时身份会合并)
//! - `NearestCentroid`: 按中心点距离贪心匹配在店顾客,未匹配的检测各自新建

use super::customer::CustomerId;
use crate::detection::Point;

/// 单个检测的绑定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// 绑定到已有的在店顾客
    Existing(CustomerId),
    /// 新顾客; 同一帧内相同槽位号共享同一个新ID
    Fresh(usize),
}

/// 身份绑定策略 Trait
pub trait IdentityPolicy: Send {
    /// 为本帧每个检测中心点给出绑定结果 (与 `centroids` 一一对应)
    ///
    /// `present`: 当前在店顾客及其最后位置
    fn bind(&mut self, centroids: &[Point], present: &[(CustomerId, Option<Point>)]) -> Vec<Binding>;

    fn name(&self) -> &'static str;
}

/// 最近分配策略: 每帧最多产生一个新顾客
#[derive(Debug, Clone, Copy, Default)]
pub struct RecencyBinding;

impl IdentityPolicy for RecencyBinding {
    fn bind(&mut self, centroids: &[Point], _present: &[(CustomerId, Option<Point>)]) -> Vec<Binding> {
        vec![Binding::Fresh(0); centroids.len()]
    }

    fn name(&self) -> &'static str {
        "recency"
    }
}

/// 最近中心点匹配
#[derive(Debug, Clone, Copy)]
pub struct NearestCentroid {
    /// 最大匹配距离 (像素)
    max_distance: f32,
}

impl NearestCentroid {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }
}

impl IdentityPolicy for NearestCentroid {
    fn bind(&mut self, centroids: &[Point], present: &[(CustomerId, Option<Point>)]) -> Vec<Binding> {
        // 所有候选对按距离升序,贪心取最近
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (det_idx, centroid) in centroids.iter().enumerate() {
            for (cust_idx, (_, position)) in present.iter().enumerate() {
                if let Some(position) = position {
                    let d = centroid.distance(position);
                    if d <= self.max_distance {
                        pairs.push((d, det_idx, cust_idx));
                    }
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut bindings: Vec<Option<Binding>> = vec![None; centroids.len()];
        let mut taken = vec![false; present.len()];
        for (_, det_idx, cust_idx) in pairs {
            if bindings[det_idx].is_some() || taken[cust_idx] {
                continue;
            }
            bindings[det_idx] = Some(Binding::Existing(present[cust_idx].0));
            taken[cust_idx] = true;
        }

        bindings
            .into_iter()
            .enumerate()
            .map(|(det_idx, b)| b.unwrap_or(Binding::Fresh(det_idx)))
            .collect()
    }

    fn name(&self) -> &'static str {
        "nearest_centroid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_shares_one_fresh_slot() {
        let mut policy = RecencyBinding;
        let centroids = [Point::new(0.0, 0.0), Point::new(100.0, 100.0)];
        let present = [(1, Some(Point::new(0.0, 0.0)))];
        assert_eq!(
            policy.bind(&centroids, &present),
            vec![Binding::Fresh(0), Binding::Fresh(0)]
        );
    }

    #[test]
    fn nearest_centroid_prefers_closest_pairs() {
        let mut policy = NearestCentroid::new(50.0);
        let centroids = [Point::new(105.0, 100.0), Point::new(2.0, 0.0), Point::new(400.0, 400.0)];
        let present = [
            (1, Some(Point::new(0.0, 0.0))),
            (2, Some(Point::new(100.0, 100.0))),
            (3, None),
        ];
        assert_eq!(
            policy.bind(&centroids, &present),
            vec![Binding::Existing(2), Binding::Existing(1), Binding::Fresh(2)]
        );
    }

    #[test]
    fn nearest_centroid_matches_each_customer_once() {
        let mut policy = NearestCentroid::new(50.0);
        let centroids = [Point::new(1.0, 0.0), Point::new(3.0, 0.0)];
        let present = [(7, Some(Point::new(0.0, 0.0)))];
        assert_eq!(
            policy.bind(&centroids, &present),
            vec![Binding::Existing(7), Binding::Fresh(1)]
        );
    }
}
