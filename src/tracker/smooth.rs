use serde::{Deserialize, Serialize};

use crate::config::SmoothConfig;
use crate::pose::{Keypoint, KeypointMap, KeypointName};

/// 平滑化の強さを決める部位グループ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointGroup {
    /// 肩・腰
    Torso,
    /// 肘・膝
    Limb,
    /// 足首・顔
    Extremity,
    /// 手首（最も動きが速く、飛びやすい）
    Hand,
}

/// キーポイント名 → 部位グループ
pub const JOINT_GROUPS: [JointGroup; KeypointName::COUNT] = {
    use JointGroup::*;
    [
        Extremity, // Nose
        Extremity, // LeftEye
        Extremity, // RightEye
        Extremity, // LeftEar
        Extremity, // RightEar
        Torso,     // LeftShoulder
        Torso,     // RightShoulder
        Limb,      // LeftElbow
        Limb,      // RightElbow
        Hand,      // LeftWrist
        Hand,      // RightWrist
        Torso,     // LeftHip
        Torso,     // RightHip
        Limb,      // LeftKnee
        Limb,      // RightKnee
        Extremity, // LeftAnkle
        Extremity, // RightAnkle
    ]
};

impl JointGroup {
    pub fn of(name: KeypointName) -> Self {
        JOINT_GROUPS[name.index()]
    }
}

fn default_max_missed_frames() -> u32 {
    5
}

/// 検出されなかったフレームでの平滑化履歴の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropoutPolicy {
    /// 履歴を捨て、次の検出から平滑化をやり直す
    Reset,
    /// 指定フレーム数までは履歴を保持する
    Retain {
        #[serde(default = "default_max_missed_frames")]
        max_missed_frames: u32,
    },
}

impl Default for DropoutPolicy {
    fn default() -> Self {
        Self::Reset
    }
}

impl DropoutPolicy {
    /// `missed` フレーム連続で未検出のとき履歴を消すべきか
    pub fn should_reset(&self, missed: u32) -> bool {
        match *self {
            Self::Reset => missed > 0,
            Self::Retain { max_missed_frames } => missed > max_missed_frames,
        }
    }
}

/// キーポイント単位の低域通過フィルタ（飛び抑制つき）
///
/// alpha は新しい観測値の反映率: `new = prev * (1 - alpha) + raw * alpha`。
/// 小さいほど滑らかで遅れる。
#[derive(Debug, Clone)]
pub struct KeypointSmoother {
    alphas: [f32; KeypointName::COUNT],
    max_jump: f32,
    jump_alpha_factor: f32,
    min_score: f32,
}

impl KeypointSmoother {
    pub fn new(config: &SmoothConfig, min_score: f32) -> Self {
        let alphas = std::array::from_fn(|i| match JOINT_GROUPS[i] {
            JointGroup::Torso => config.torso,
            JointGroup::Limb => config.limbs,
            JointGroup::Extremity => config.extremities,
            JointGroup::Hand => config.hands,
        });
        Self {
            alphas,
            max_jump: config.max_jump_pixels,
            jump_alpha_factor: config.jump_alpha_factor,
            min_score,
        }
    }

    pub fn alpha(&self, name: KeypointName) -> f32 {
        self.alphas[name.index()]
    }

    /// `raw` で `smoothed` を更新する。
    ///
    /// - 欠損または閾値未満: 前回値を保持（0 に減衰させない）
    /// - 前回値なし: そのまま採用
    /// - 移動量が上限を超える: 同じ方向に上限まで切り詰め、alpha を弱める
    pub fn apply(&self, smoothed: &mut KeypointMap, raw: &KeypointMap) {
        for name in KeypointName::ALL {
            let Some(kp) = raw.confident(name, self.min_score) else {
                continue;
            };
            let next = match smoothed.get(name) {
                None => *kp,
                Some(prev) => self.blend(prev, kp),
            };
            smoothed.insert(next);
        }
    }

    /// 上限で切り詰めた目標位置と、そのフレームで使う alpha
    pub fn clamp_jump(&self, prev: &Keypoint, raw: &Keypoint) -> (f32, f32, f32) {
        let mut alpha = self.alpha(raw.name);
        let dx = raw.x - prev.x;
        let dy = raw.y - prev.y;
        let dist = dx.hypot(dy);
        if dist > self.max_jump {
            let ratio = self.max_jump / dist;
            alpha *= self.jump_alpha_factor;
            (prev.x + dx * ratio, prev.y + dy * ratio, alpha)
        } else {
            (raw.x, raw.y, alpha)
        }
    }

    fn blend(&self, prev: &Keypoint, raw: &Keypoint) -> Keypoint {
        let (tx, ty, alpha) = self.clamp_jump(prev, raw);
        Keypoint::new(
            raw.name,
            prev.x * (1.0 - alpha) + tx * alpha,
            prev.y * (1.0 - alpha) + ty * alpha,
            raw.score,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 0.25;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn smoother() -> KeypointSmoother {
        KeypointSmoother::new(&SmoothConfig::default(), THRESHOLD)
    }

    fn map_of(kps: &[Keypoint]) -> KeypointMap {
        kps.iter().copied().collect()
    }

    #[test]
    fn test_group_table() {
        assert_eq!(JointGroup::of(KeypointName::LeftWrist), JointGroup::Hand);
        assert_eq!(JointGroup::of(KeypointName::RightElbow), JointGroup::Limb);
        assert_eq!(JointGroup::of(KeypointName::LeftKnee), JointGroup::Limb);
        assert_eq!(JointGroup::of(KeypointName::RightHip), JointGroup::Torso);
        assert_eq!(JointGroup::of(KeypointName::LeftShoulder), JointGroup::Torso);
        assert_eq!(JointGroup::of(KeypointName::LeftAnkle), JointGroup::Extremity);
        assert_eq!(JointGroup::of(KeypointName::Nose), JointGroup::Extremity);
    }

    #[test]
    fn test_wrists_smoothed_hardest() {
        let s = smoother();
        let wrist = s.alpha(KeypointName::LeftWrist);
        let elbow = s.alpha(KeypointName::LeftElbow);
        let shoulder = s.alpha(KeypointName::LeftShoulder);
        assert!(wrist < elbow && elbow < shoulder);
    }

    #[test]
    fn test_first_frame_passthrough() {
        let s = smoother();
        let mut smoothed = KeypointMap::new();
        let raw = map_of(&[Keypoint::new(KeypointName::Nose, 10.0, 20.0, 0.9)]);
        s.apply(&mut smoothed, &raw);
        assert_eq!(smoothed, raw);
    }

    #[test]
    fn test_blend_uses_group_alpha() {
        let s = smoother();
        let mut smoothed = map_of(&[Keypoint::new(KeypointName::LeftShoulder, 0.0, 0.0, 0.9)]);
        let raw = map_of(&[Keypoint::new(KeypointName::LeftShoulder, 100.0, 0.0, 0.8)]);
        s.apply(&mut smoothed, &raw);
        let kp = smoothed.get(KeypointName::LeftShoulder).unwrap();
        assert!(approx_eq(kp.x, 50.0));
        assert_eq!(kp.score, 0.8);
    }

    #[test]
    fn test_low_confidence_freezes_previous() {
        let s = smoother();
        let prev = Keypoint::new(KeypointName::RightWrist, 5.0, 6.0, 0.9);
        let mut smoothed = map_of(&[prev]);
        let raw = map_of(&[Keypoint::new(KeypointName::RightWrist, 500.0, 600.0, 0.1)]);
        s.apply(&mut smoothed, &raw);
        assert_eq!(smoothed.get(KeypointName::RightWrist), Some(&prev));

        // 欠損も同じ
        s.apply(&mut smoothed, &KeypointMap::new());
        assert_eq!(smoothed.get(KeypointName::RightWrist), Some(&prev));
    }

    #[test]
    fn test_low_confidence_without_history_stays_absent() {
        let s = smoother();
        let mut smoothed = KeypointMap::new();
        let raw = map_of(&[Keypoint::new(KeypointName::RightWrist, 5.0, 6.0, 0.1)]);
        s.apply(&mut smoothed, &raw);
        assert!(smoothed.is_empty());
    }

    #[test]
    fn test_jump_clamped_to_ceiling() {
        let s = smoother();
        let prev = Keypoint::new(KeypointName::LeftShoulder, 0.0, 0.0, 0.9);
        let raw = Keypoint::new(KeypointName::LeftShoulder, 500.0, 0.0, 0.9);
        let (tx, ty, alpha) = s.clamp_jump(&prev, &raw);
        assert!(approx_eq(tx, 300.0));
        assert!(approx_eq(ty, 0.0));
        assert!(approx_eq(alpha, 0.25));

        let mut smoothed = map_of(&[prev]);
        s.apply(&mut smoothed, &map_of(&[raw]));
        // 300 * 0.25
        assert!(approx_eq(smoothed.get(KeypointName::LeftShoulder).unwrap().x, 75.0));
    }

    #[test]
    fn test_jump_keeps_direction() {
        let s = smoother();
        let prev = Keypoint::new(KeypointName::Nose, 100.0, 100.0, 0.9);
        let raw = Keypoint::new(KeypointName::Nose, 400.0, 500.0, 0.9);
        let (tx, ty, _) = s.clamp_jump(&prev, &raw);
        // 方向 (0.6, 0.8)
        assert!(approx_eq(tx, 280.0));
        assert!(approx_eq(ty, 340.0));
    }

    #[test]
    fn test_small_motion_not_clamped() {
        let s = smoother();
        let prev = Keypoint::new(KeypointName::LeftKnee, 0.0, 0.0, 0.9);
        let raw = Keypoint::new(KeypointName::LeftKnee, 30.0, 40.0, 0.9);
        let (tx, ty, alpha) = s.clamp_jump(&prev, &raw);
        assert_eq!((tx, ty), (30.0, 40.0));
        assert!(approx_eq(alpha, 0.4));
    }

    #[test]
    fn test_dropout_policy() {
        assert!(!DropoutPolicy::Reset.should_reset(0));
        assert!(DropoutPolicy::Reset.should_reset(1));
        let retain = DropoutPolicy::Retain { max_missed_frames: 2 };
        assert!(!retain.should_reset(1));
        assert!(!retain.should_reset(2));
        assert!(retain.should_reset(3));
    }
}
