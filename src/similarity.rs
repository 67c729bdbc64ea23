//! Pose similarity against the current target.
//!
//! Two policies are available and selected by configuration: a coarse
//! categorical comparison of both arms, and a continuous per-joint distance
//! score. Both return exactly 0 when the user pose failed normalization or the
//! target is empty.

use serde::{Deserialize, Serialize};

use crate::pose::{KeypointName, NormalizedPose};

/// 手首が肩よりこれ以上上なら「上げている」
pub const ARM_UP_MARGIN: f32 = 0.12;
/// 手首と腰の高さの差がこれ未満なら「腰に手」
pub const ARM_HIPS_MARGIN: f32 = 0.06;
/// 腰が見えないときの肩からの推定距離
pub const HIP_FALLBACK_OFFSET: f32 = 0.55;

fn default_sensitivity() -> f32 {
    1.0
}

/// 類似度の計算方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimilarityPolicy {
    /// 左右の腕の状態（上/腰/下）が両方一致したときだけ 1.0
    ArmState,
    /// 共通キーポイントの距離から連続値を出す
    Distance {
        #[serde(default = "default_sensitivity")]
        sensitivity: f32,
    },
}

impl Default for SimilarityPolicy {
    fn default() -> Self {
        Self::ArmState
    }
}

impl SimilarityPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ArmState => "arm_state",
            Self::Distance { .. } => "distance",
        }
    }

    /// `user` が None（正規化失敗）なら 0
    pub fn evaluate(&self, user: Option<&NormalizedPose>, target: &NormalizedPose) -> f32 {
        let Some(user) = user else {
            return 0.0;
        };
        if target.is_empty() {
            return 0.0;
        }
        match *self {
            Self::ArmState => arm_state_similarity(user, target),
            Self::Distance { sensitivity } => distance_similarity(user, target, sensitivity),
        }
    }
}

/// 難易度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Normal, Self::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }
}

/// 難易度ごとの合格ライン
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyThresholds {
    pub easy: f32,
    pub normal: f32,
    pub hard: f32,
}

impl DifficultyThresholds {
    pub const ARM_STATE: DifficultyThresholds = DifficultyThresholds {
        easy: 0.75,
        normal: 0.85,
        hard: 0.95,
    };

    pub const DISTANCE: DifficultyThresholds = DifficultyThresholds {
        easy: 0.6,
        normal: 0.7,
        hard: 0.8,
    };

    pub fn get(&self, difficulty: Difficulty) -> f32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Normal => self.normal,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn is_increasing(&self) -> bool {
        self.easy < self.normal && self.normal < self.hard
    }
}

/// 腕の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Up,
    Hips,
    Down,
}

/// y は下向き正。
pub fn classify_arm(wrist_y: f32, shoulder_y: f32, hip_y: f32) -> ArmState {
    if wrist_y - shoulder_y <= -ARM_UP_MARGIN {
        ArmState::Up
    } else if (wrist_y - hip_y).abs() < ARM_HIPS_MARGIN {
        ArmState::Hips
    } else {
        ArmState::Down
    }
}

/// 左右の腕の状態。肩がなければ None。
pub fn arm_states(pose: &NormalizedPose) -> Option<(ArmState, ArmState)> {
    let ls = pose.get(KeypointName::LeftShoulder)?;
    let rs = pose.get(KeypointName::RightShoulder)?;
    let shoulder_y = (ls.y + rs.y) / 2.0;
    let hip_y = match (pose.get(KeypointName::LeftHip), pose.get(KeypointName::RightHip)) {
        (Some(lh), Some(rh)) => (lh.y + rh.y) / 2.0,
        _ => shoulder_y + HIP_FALLBACK_OFFSET,
    };
    let arm = |wrist: KeypointName| {
        pose.get(wrist)
            .map_or(ArmState::Down, |w| classify_arm(w.y, shoulder_y, hip_y))
    };
    Some((arm(KeypointName::LeftWrist), arm(KeypointName::RightWrist)))
}

fn arm_state_similarity(user: &NormalizedPose, target: &NormalizedPose) -> f32 {
    match (arm_states(user), arm_states(target)) {
        (Some(u), Some(t)) if u == t => 1.0,
        _ => 0.0,
    }
}

fn distance_similarity(user: &NormalizedPose, target: &NormalizedPose, sensitivity: f32) -> f32 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (name, t) in target.iter() {
        if let Some(u) = user.get(name) {
            total += (1.0 - u.distance(&t) * sensitivity).max(0.0);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}
