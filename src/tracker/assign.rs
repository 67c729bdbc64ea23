use tracing::debug;

use crate::config::AssignConfig;
use crate::pose::{KeypointMap, KeypointName, Point2};
use crate::tracker::slot::MAX_PLAYERS;

/// 割り当てに使う代表点（中心と両手）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseAnchor {
    pub center: Point2,
    pub left_hand: Point2,
    pub right_hand: Point2,
}

/// 姿勢の中心。
///
/// 肩の中点 → 腰の中点 → 閾値以上の全キーポイントの重心 → 原点 の順で採用。
pub fn pose_center(map: &KeypointMap, min_score: f32) -> Point2 {
    let pair = |a: KeypointName, b: KeypointName| {
        let a = map.confident(a, min_score)?;
        let b = map.confident(b, min_score)?;
        Some(a.position().midpoint(&b.position()))
    };
    if let Some(c) = pair(KeypointName::LeftShoulder, KeypointName::RightShoulder) {
        return c;
    }
    if let Some(c) = pair(KeypointName::LeftHip, KeypointName::RightHip) {
        return c;
    }
    let (sum_x, sum_y, count) = map
        .iter()
        .filter(|kp| kp.is_valid(min_score))
        .fold((0.0, 0.0, 0usize), |(sx, sy, n), kp| (sx + kp.x, sy + kp.y, n + 1));
    if count > 0 {
        Point2::new(sum_x / count as f32, sum_y / count as f32)
    } else {
        Point2::ORIGIN
    }
}

/// 割り当て結果。`slots[i]` は枠 i に渡した検出のインデックス。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub slots: [Option<usize>; MAX_PLAYERS],
    /// どの枠にも渡らなかった検出
    pub dropped: Vec<usize>,
}

impl Assignment {
    pub fn slot_of(&self, detection: usize) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(detection))
    }

    pub fn assigned_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

/// フレームごとの検出を固定数のプレイヤー枠へ割り当てる
#[derive(Debug, Clone)]
pub struct IdentityAssigner {
    config: AssignConfig,
    min_score: f32,
}

impl IdentityAssigner {
    pub fn new(config: &AssignConfig, min_score: f32) -> Self {
        Self {
            config: config.clone(),
            min_score,
        }
    }

    pub fn anchor(&self, map: &KeypointMap) -> PoseAnchor {
        let center = pose_center(map, self.min_score);
        let offset = self.config.hand_fallback_offset;
        let hand = |name: KeypointName, dx: f32| {
            map.confident(name, self.min_score)
                .map(|kp| kp.position())
                .unwrap_or(Point2::new(center.x + dx, center.y))
        };
        PoseAnchor {
            center,
            left_hand: hand(KeypointName::LeftWrist, -offset),
            right_hand: hand(KeypointName::RightWrist, offset),
        }
    }

    /// 中心と両手の重み付き距離
    pub fn distance(&self, a: &PoseAnchor, b: &PoseAnchor) -> f32 {
        a.center.distance(&b.center) * self.config.center_weight
            + a.left_hand.distance(&b.left_hand) * self.config.left_hand_weight
            + a.right_hand.distance(&b.right_hand) * self.config.right_hand_weight
    }

    /// 候補の評価値（大きいほど良い）。
    ///
    /// 枠で最も近い候補から `sticky_margin` 以内の候補だけが、前フレームの
    /// 中心に近いほど加点される。それより遠い候補は重み付き距離だけで並ぶ。
    fn candidate_score(&self, prev: &PoseAnchor, candidate: &PoseAnchor, distance: f32, nearest: f32) -> f32 {
        if distance > nearest + self.config.sticky_margin {
            return -distance;
        }
        let center_distance = prev.center.distance(&candidate.center);
        let bonus = (self.config.sticky_distance - center_distance).max(0.0) * self.config.sticky_factor;
        bonus - distance
    }

    /// `previous[i]` は有効な枠 i の前フレームの平滑化姿勢（なければ None）。
    /// `previous.len()` を超える枠は割り当て対象外。
    ///
    /// 1. 前フレームの姿勢がある枠と検出の組を評価値の高い順に確定する
    ///    （`frame_width * max_distance_fraction` 以上離れた候補は別人とみなす）
    /// 2. 残りの枠には、残った検出を左から順に渡す
    pub fn assign(
        &self,
        detections: &[KeypointMap],
        previous: &[Option<&KeypointMap>],
        frame_width: f32,
    ) -> Assignment {
        let mut result = Assignment::default();
        let active = previous.len().min(MAX_PLAYERS);

        let anchors: Vec<PoseAnchor> = detections.iter().map(|d| self.anchor(d)).collect();
        let mut order: Vec<usize> = (0..detections.len()).collect();
        order.sort_by(|&a, &b| anchors[a].center.x.total_cmp(&anchors[b].center.x));

        let mut taken = vec![false; detections.len()];
        let ceiling = frame_width * self.config.max_distance_fraction;

        // (枠, 検出, 評価値)。同点なら枠番号の小さい方、左の検出が先。
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (slot, prev) in previous.iter().enumerate().take(active) {
            let Some(prev) = prev else { continue };
            let prev_anchor = self.anchor(prev);

            let reachable: Vec<(usize, f32)> = order
                .iter()
                .map(|&i| (i, self.distance(&prev_anchor, &anchors[i])))
                .filter(|&(_, d)| d < ceiling)
                .collect();
            let Some(nearest) = reachable.iter().map(|&(_, d)| d).min_by(f32::total_cmp) else {
                debug!(slot, "no candidate within reach");
                continue;
            };
            for (i, d) in reachable {
                let score = self.candidate_score(&prev_anchor, &anchors[i], d, nearest);
                pairs.push((slot, i, score));
            }
        }
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut warm_done = [false; MAX_PLAYERS];
        for (slot, i, score) in pairs {
            if warm_done[slot] || taken[i] {
                continue;
            }
            warm_done[slot] = true;
            taken[i] = true;
            result.slots[slot] = Some(i);
            debug!(slot, detection = i, score, "continued");
        }

        let mut remaining = order.iter().copied().filter(|&i| !taken[i]).collect::<Vec<_>>().into_iter();
        for (slot, prev) in previous.iter().enumerate().take(active) {
            if prev.is_some() {
                continue;
            }
            let Some(i) = remaining.next() else { break };
            taken[i] = true;
            result.slots[slot] = Some(i);
            debug!(slot, detection = i, "cold start");
        }

        result.dropped = order.into_iter().filter(|&i| !taken[i]).collect();
        if !result.dropped.is_empty() {
            debug!(dropped = ?result.dropped, "untracked detections");
        }
        result
    }
}
