use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::keypoint::KeypointName;
use super::normalize::NormalizedPose;

/// お題ポーズ。肩中心・肩幅単位の座標で、信頼度は持たない。
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPose {
    pub id: String,
    pub name: String,
    pub keypoints: NormalizedPose,
}

/// 設定ファイル上のお題定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPoseDef {
    pub id: String,
    pub name: String,
    /// 部位名 → [x, y]
    pub keypoints: BTreeMap<KeypointName, [f32; 2]>,
}

impl From<&TargetPoseDef> for TargetPose {
    fn from(def: &TargetPoseDef) -> Self {
        let mut keypoints = NormalizedPose::new();
        for (&name, &[x, y]) in &def.keypoints {
            keypoints = keypoints.with(name, x, y);
        }
        TargetPose {
            id: def.id.clone(),
            name: def.name.clone(),
            keypoints,
        }
    }
}

fn standing() -> NormalizedPose {
    use KeypointName::*;
    NormalizedPose::new()
        .with(LeftShoulder, -0.5, -0.35)
        .with(RightShoulder, 0.5, -0.35)
        .with(LeftElbow, -0.6, -0.1)
        .with(RightElbow, 0.6, -0.1)
        .with(LeftWrist, -0.55, 0.15)
        .with(RightWrist, 0.55, 0.15)
        .with(LeftHip, -0.4, 0.25)
        .with(RightHip, 0.4, 0.25)
        .with(LeftKnee, -0.45, 0.6)
        .with(RightKnee, 0.45, 0.6)
        .with(LeftAnkle, -0.45, 0.9)
        .with(RightAnkle, 0.45, 0.9)
}

fn target(id: &str, name: &str, keypoints: NormalizedPose) -> TargetPose {
    TargetPose {
        id: id.to_string(),
        name: name.to_string(),
        keypoints,
    }
}

/// 組み込みのお題一覧（直立姿勢をベースに一部の関節だけ差し替え）
pub fn builtin_targets() -> Vec<TargetPose> {
    use KeypointName::*;
    vec![
        target(
            "right_hand_up",
            "Right hand up",
            standing().with(RightElbow, 0.5, -0.5).with(RightWrist, 0.45, -0.75),
        ),
        target(
            "left_hand_up",
            "Left hand up",
            standing().with(LeftElbow, -0.5, -0.5).with(LeftWrist, -0.45, -0.75),
        ),
        target(
            "both_hands_up",
            "Both hands up",
            standing()
                .with(LeftElbow, -0.5, -0.55)
                .with(RightElbow, 0.5, -0.55)
                .with(LeftWrist, -0.5, -0.8)
                .with(RightWrist, 0.5, -0.8),
        ),
        target(
            "y_pose",
            "Y pose",
            standing()
                .with(LeftElbow, -0.55, -0.5)
                .with(RightElbow, 0.55, -0.5)
                .with(LeftWrist, -0.7, -0.8)
                .with(RightWrist, 0.7, -0.8),
        ),
        target(
            "hands_hips",
            "Hands on hips",
            standing().with(LeftWrist, -0.4, 0.2).with(RightWrist, 0.4, 0.2),
        ),
        target(
            "flamingo",
            "Flamingo",
            standing().with(RightKnee, 0.7, 0.4).with(RightAnkle, 0.7, 0.6),
        ),
        target("stand_neutral", "Attention", standing()),
    ]
}

/// お題ライブラリ。手動の「次へ」と一定間隔の自動送りを持つ。
pub struct TargetLibrary {
    poses: Vec<TargetPose>,
    current: usize,
    auto_advance: Option<Duration>,
    last_advance: Option<Instant>,
}

impl TargetLibrary {
    /// `poses` が空なら組み込みのお題を使う
    pub fn new(poses: Vec<TargetPose>, auto_advance: Option<Duration>) -> Self {
        let poses = if poses.is_empty() { builtin_targets() } else { poses };
        Self {
            poses,
            current: 0,
            auto_advance: auto_advance.filter(|d| !d.is_zero()),
            last_advance: None,
        }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_targets(), None)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&TargetPose> {
        self.poses.get(self.current)
    }

    pub fn poses(&self) -> &[TargetPose] {
        &self.poses
    }

    /// 次のお題へ（末尾の次は先頭）
    pub fn advance(&mut self) -> Option<&TargetPose> {
        if self.poses.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.poses.len();
        self.current()
    }

    pub fn select(&mut self, index: usize) -> Option<&TargetPose> {
        if index >= self.poses.len() {
            return None;
        }
        self.current = index;
        self.current()
    }

    /// 自動送りのタイマーを進める。お題が変わったら true。
    /// 最初の呼び出しでタイマーを開始する。
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(interval) = self.auto_advance else {
            return false;
        };
        let last = *self.last_advance.get_or_insert(now);
        if now.saturating_duration_since(last) >= interval {
            self.last_advance = Some(now);
            self.advance();
            true
        } else {
            false
        }
    }

    /// 手動で送ったときにタイマーも巻き戻す
    pub fn restart_timer(&mut self, now: Instant) {
        if self.auto_advance.is_some() {
            self.last_advance = Some(now);
        }
    }
}
