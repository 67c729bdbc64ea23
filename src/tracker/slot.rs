use std::time::Instant;

use crate::pose::KeypointMap;

/// 同時にプレイできる最大人数
pub const MAX_PLAYERS: usize = 4;

/// プレイヤー枠。セッション開始時に MAX_PLAYERS 個作られ、破棄されずリセットだけされる。
#[derive(Debug, Clone, Default)]
pub struct PlayerSlot {
    pub index: usize,
    /// 平滑化済みキーポイント（未検出なら空）
    pub smoothed: KeypointMap,
    /// このフレームに割り当てられた生の検出
    pub raw: Option<KeypointMap>,
    pub assigned: bool,
    /// 連続未検出フレーム数
    pub missed_frames: u32,
    /// 一致フレームのカウンタ（保持判定用）
    pub match_streak: u32,
    pub score: u32,
    pub cooldown_until: Option<Instant>,
    /// 直近の類似度と判定。未評価なら None。
    pub similarity: Option<f32>,
    pub matched: Option<bool>,
}

impl PlayerSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn has_history(&self) -> bool {
        !self.smoothed.is_empty()
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// フレーム開始時の状態に戻す
    pub fn begin_frame(&mut self) {
        self.raw = None;
        self.assigned = false;
        self.similarity = None;
        self.matched = None;
    }

    /// 平滑化履歴と一致カウンタを捨てる。得点とクールダウンは残す。
    pub fn reset_tracking(&mut self) {
        self.smoothed.clear();
        self.raw = None;
        self.assigned = false;
        self.missed_frames = 0;
        self.match_streak = 0;
        self.similarity = None;
        self.matched = None;
    }

    /// 新しいゲーム用に全てを初期化
    pub fn reset_all(&mut self) {
        *self = Self::new(self.index);
    }
}
