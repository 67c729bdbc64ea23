//! Per-slot scoring state machine.
//!
//! A slot is idle unless `cooldown_until` lies in the future. A qualifying
//! frame (similarity at or above the difficulty threshold) awards exactly one
//! point when the policy is satisfied and the slot is not cooling down.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::tracker::PlayerSlot;

fn default_hold_frames() -> u32 {
    8
}

fn default_miss_penalty() -> u32 {
    2
}

/// 得点の付け方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// 一致した瞬間に加点
    Immediate,
    /// 一致が `hold_frames` 溜まったら加点。不一致で `miss_penalty` ずつ減る。
    Hold {
        #[serde(default = "default_hold_frames")]
        hold_frames: u32,
        #[serde(default = "default_miss_penalty")]
        miss_penalty: u32,
    },
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::Immediate
    }
}

/// 1フレーム分の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreOutcome {
    /// 合格ライン以上か（クールダウン中でも true になりうる）
    pub matched: bool,
    /// このフレームで加点したか
    pub awarded: bool,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    policy: ScoringPolicy,
    cooldown: Duration,
}

impl Scorer {
    pub fn new(policy: ScoringPolicy, cooldown: Duration) -> Self {
        Self { policy, cooldown }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn update(
        &self,
        slot: &mut PlayerSlot,
        similarity: f32,
        threshold: f32,
        now: Instant,
    ) -> ScoreOutcome {
        let matched = similarity >= threshold;
        let cooling = slot.is_cooling_down(now);

        let ready = match self.policy {
            ScoringPolicy::Immediate => {
                slot.match_streak = if matched { slot.match_streak.saturating_add(1) } else { 0 };
                matched
            }
            ScoringPolicy::Hold { hold_frames, miss_penalty } => {
                if !matched {
                    slot.match_streak = slot.match_streak.saturating_sub(miss_penalty);
                } else if !cooling {
                    slot.match_streak = (slot.match_streak + 1).min(hold_frames);
                }
                matched && slot.match_streak >= hold_frames
            }
        };

        let awarded = ready && !cooling;
        if awarded {
            slot.score += 1;
            slot.cooldown_until = Some(now + self.cooldown);
            slot.match_streak = 0;
            info!(player = slot.index + 1, score = slot.score, similarity, "point awarded");
        }

        slot.similarity = Some(similarity);
        slot.matched = Some(matched);
        ScoreOutcome { matched, awarded }
    }

    /// 検出されなかった枠: カウンタを戻す
    pub fn miss(&self, slot: &mut PlayerSlot) {
        slot.match_streak = 0;
        slot.similarity = None;
        slot.matched = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 0.85;
    const FRAME: Duration = Duration::from_millis(33);

    fn immediate() -> Scorer {
        Scorer::new(ScoringPolicy::Immediate, Duration::from_millis(2500))
    }

    #[test]
    fn test_immediate_awards_once_per_cooldown() {
        let scorer = immediate();
        let mut slot = PlayerSlot::new(0);
        let t0 = Instant::now();

        let mut awarded = 0;
        for i in 0..60 {
            let out = scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * i);
            assert!(out.matched);
            if out.awarded {
                awarded += 1;
            }
        }
        // 60 * 33ms = 1980ms < 2500ms
        assert_eq!(awarded, 1);
        assert_eq!(slot.score, 1);

        let out = scorer.update(&mut slot, 1.0, THRESHOLD, t0 + Duration::from_millis(2500));
        assert!(out.awarded);
        assert_eq!(slot.score, 2);
    }

    #[test]
    fn test_below_threshold_no_award() {
        let scorer = immediate();
        let mut slot = PlayerSlot::new(0);
        let out = scorer.update(&mut slot, 0.84, THRESHOLD, Instant::now());
        assert_eq!(out, ScoreOutcome { matched: false, awarded: false });
        assert_eq!(slot.score, 0);
        assert_eq!(slot.matched, Some(false));
    }

    #[test]
    fn test_cooldown_set_on_award() {
        let scorer = immediate();
        let mut slot = PlayerSlot::new(1);
        let now = Instant::now();
        scorer.update(&mut slot, 1.0, THRESHOLD, now);
        assert_eq!(slot.cooldown_until, Some(now + Duration::from_millis(2500)));
        assert!(slot.is_cooling_down(now + Duration::from_millis(2499)));
        assert_eq!(slot.match_streak, 0);
    }

    #[test]
    fn test_hold_requires_sustained_match() {
        let scorer = Scorer::new(
            ScoringPolicy::Hold { hold_frames: 3, miss_penalty: 2 },
            Duration::from_millis(1000),
        );
        let mut slot = PlayerSlot::new(0);
        let t0 = Instant::now();
        assert!(!scorer.update(&mut slot, 1.0, THRESHOLD, t0).awarded);
        assert!(!scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME).awarded);
        assert!(scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * 2).awarded);
        assert_eq!(slot.score, 1);
    }

    #[test]
    fn test_hold_flicker_decrements_without_reset() {
        let scorer = Scorer::new(
            ScoringPolicy::Hold { hold_frames: 5, miss_penalty: 2 },
            Duration::from_millis(1000),
        );
        let mut slot = PlayerSlot::new(0);
        let t0 = Instant::now();
        for i in 0..4 {
            scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * i);
        }
        assert_eq!(slot.match_streak, 4);
        scorer.update(&mut slot, 0.0, THRESHOLD, t0 + FRAME * 4);
        assert_eq!(slot.match_streak, 2);
        scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * 5);
        scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * 6);
        assert_eq!(slot.score, 0);
        assert!(scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * 7).awarded);
    }

    #[test]
    fn test_hold_does_not_accumulate_while_cooling() {
        let scorer = Scorer::new(
            ScoringPolicy::Hold { hold_frames: 2, miss_penalty: 1 },
            Duration::from_millis(1000),
        );
        let mut slot = PlayerSlot::new(0);
        let t0 = Instant::now();
        scorer.update(&mut slot, 1.0, THRESHOLD, t0);
        assert!(scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME).awarded);
        for i in 2..20 {
            let out = scorer.update(&mut slot, 1.0, THRESHOLD, t0 + FRAME * i);
            assert!(out.matched && !out.awarded);
        }
        assert_eq!(slot.match_streak, 0);
        assert_eq!(slot.score, 1);
    }

    #[test]
    fn test_miss_resets_streak() {
        let scorer = immediate();
        let mut slot = PlayerSlot::new(0);
        slot.match_streak = 7;
        slot.matched = Some(true);
        scorer.miss(&mut slot);
        assert_eq!(slot.match_streak, 0);
        assert_eq!(slot.matched, None);
    }

    #[test]
    fn test_policy_deserialize() {
        let p: ScoringPolicy = toml::from_str("kind = \"hold\"\nhold_frames = 4").unwrap();
        assert_eq!(p, ScoringPolicy::Hold { hold_frames: 4, miss_penalty: 2 });
    }
}
