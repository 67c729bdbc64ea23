//! One game session: the slot array plus every pipeline stage.
//!
//! `process_frame` runs assignment → smoothing → normalization/similarity →
//! scoring once per frame. It never fails; every input problem degrades to
//! "no match" for the affected slot.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{check_player_count, Config};
use crate::error::ConfigError;
use crate::pose::{normalize, KeypointMap, Skeleton, TargetLibrary, TargetPose};
use crate::scoring::Scorer;
use crate::similarity::{Difficulty, DifficultyThresholds, SimilarityPolicy};
use crate::tracker::{DropoutPolicy, IdentityAssigner, KeypointSmoother, PlayerSlot, MAX_PLAYERS};

/// 描画側に渡す1人分の結果
#[derive(Debug, Clone, Serialize)]
pub struct PlayerReport {
    pub slot: usize,
    pub assigned: bool,
    /// 平滑化済みキーポイント
    pub keypoints: KeypointMap,
    pub similarity: Option<f32>,
    pub matched: Option<bool>,
    pub awarded: bool,
    pub score: u32,
    pub cooling_down: bool,
}

/// 1フレーム分の結果
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub target_index: usize,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    pub target_changed: bool,
    /// 境界でのフィルタ後の検出数
    pub detections: usize,
    /// どの枠にも割り当てられなかった検出数
    pub dropped: usize,
    pub players: Vec<PlayerReport>,
}

impl FrameReport {
    pub fn player(&self, slot: usize) -> Option<&PlayerReport> {
        self.players.iter().find(|p| p.slot == slot)
    }
}

pub struct GameSession {
    slots: [PlayerSlot; MAX_PLAYERS],
    player_count: usize,
    difficulty: Difficulty,
    similarity: SimilarityPolicy,
    thresholds: DifficultyThresholds,
    min_keypoint_score: f32,
    min_pose_score: f32,
    max_poses: usize,
    dropout: DropoutPolicy,
    smoother: KeypointSmoother,
    assigner: IdentityAssigner,
    scorer: Scorer,
    targets: TargetLibrary,
    frame: u64,
}

impl GameSession {
    pub fn new(config: &Config) -> Self {
        let poses: Vec<TargetPose> = config
            .targets
            .poses
            .iter()
            .flatten()
            .map(TargetPose::from)
            .collect();
        let min_score = config.game.min_keypoint_score;
        Self {
            slots: std::array::from_fn(PlayerSlot::new),
            player_count: config.game.player_count.clamp(1, MAX_PLAYERS),
            difficulty: config.game.difficulty,
            similarity: config.game.similarity,
            thresholds: config.game.thresholds_for(&config.game.similarity),
            min_keypoint_score: min_score,
            min_pose_score: config.detector.min_pose_score,
            max_poses: config.detector.max_poses,
            dropout: config.smooth.dropout,
            smoother: KeypointSmoother::new(&config.smooth, min_score),
            assigner: IdentityAssigner::new(&config.assign, min_score),
            scorer: Scorer::new(config.game.scoring, config.game.cooldown()),
            targets: TargetLibrary::new(poses, config.targets.auto_advance()),
            frame: 0,
        }
    }

    pub fn process_frame(&mut self, detections: &[Skeleton], frame_width: f32, now: Instant) -> FrameReport {
        self.frame += 1;
        let target_changed = self.targets.tick(now);
        if target_changed {
            self.clear_judgements();
            info!(pose = self.target_id(), "target auto-advanced");
        }

        let maps: Vec<KeypointMap> = detections
            .iter()
            .filter(|s| s.score >= self.min_pose_score)
            .take(self.max_poses)
            .map(Skeleton::to_map)
            .collect();

        for slot in &mut self.slots {
            slot.begin_frame();
        }

        let active = self.player_count;
        let assignment = {
            let previous: Vec<Option<&KeypointMap>> = self.slots[..active]
                .iter()
                .map(|s| s.has_history().then_some(&s.smoothed))
                .collect();
            self.assigner.assign(&maps, &previous, frame_width)
        };

        let threshold = self.thresholds.get(self.difficulty);
        let target = self.targets.current();
        let mut awarded = [false; MAX_PLAYERS];

        for (i, slot) in self.slots[..active].iter_mut().enumerate() {
            let Some(d) = assignment.slots[i] else {
                slot.missed_frames += 1;
                self.scorer.miss(slot);
                if self.dropout.should_reset(slot.missed_frames) {
                    slot.reset_tracking();
                }
                continue;
            };

            let raw = maps[d].clone();
            self.smoother.apply(&mut slot.smoothed, &raw);
            slot.raw = Some(raw);
            slot.assigned = true;
            slot.missed_frames = 0;

            let normalized = normalize(&slot.smoothed, self.min_keypoint_score);
            let similarity = target.map_or(0.0, |t| {
                self.similarity.evaluate(normalized.as_ref(), &t.keypoints)
            });
            awarded[i] = self.scorer.update(slot, similarity, threshold, now).awarded;
        }

        debug!(
            frame = self.frame,
            detections = maps.len(),
            assigned = assignment.assigned_count(),
            "frame processed"
        );

        FrameReport {
            frame: self.frame,
            target_index: self.targets.current_index(),
            target_id: self.targets.current().map(|t| t.id.clone()),
            target_name: self.targets.current().map(|t| t.name.clone()),
            target_changed,
            detections: maps.len(),
            dropped: assignment.dropped.len(),
            players: self.slots[..active]
                .iter()
                .map(|slot| PlayerReport {
                    slot: slot.index,
                    assigned: slot.assigned,
                    keypoints: slot.smoothed.clone(),
                    similarity: slot.similarity,
                    matched: slot.matched,
                    awarded: awarded[slot.index],
                    score: slot.score,
                    cooling_down: slot.is_cooling_down(now),
                })
                .collect(),
        }
    }

    /// 参加人数を変える。範囲外の枠は平滑化履歴を捨てる（得点は残る）。
    pub fn set_player_count(&mut self, count: usize) -> Result<(), ConfigError> {
        check_player_count(count)?;
        for slot in &mut self.slots[count..] {
            slot.reset_tracking();
        }
        if count != self.player_count {
            info!(from = self.player_count, to = count, "player count changed");
        }
        self.player_count = count;
        Ok(())
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if difficulty != self.difficulty {
            info!(difficulty = difficulty.as_str(), "difficulty changed");
        }
        self.difficulty = difficulty;
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// 現在の難易度・類似度方式での合格ライン
    pub fn threshold(&self) -> f32 {
        self.thresholds.get(self.difficulty)
    }

    pub fn similarity_policy(&self) -> SimilarityPolicy {
        self.similarity
    }

    /// 「次のお題」ボタン
    pub fn next_target(&mut self, now: Instant) {
        self.targets.advance();
        self.targets.restart_timer(now);
        self.clear_judgements();
        info!(pose = self.target_id(), "target changed");
    }

    pub fn select_target(&mut self, index: usize, now: Instant) -> bool {
        if self.targets.select(index).is_none() {
            return false;
        }
        self.targets.restart_timer(now);
        self.clear_judgements();
        true
    }

    pub fn targets(&self) -> &TargetLibrary {
        &self.targets
    }

    fn target_id(&self) -> &str {
        self.targets.current().map_or("-", |t| t.id.as_str())
    }

    /// 有効な枠
    pub fn slots(&self) -> &[PlayerSlot] {
        &self.slots[..self.player_count]
    }

    pub fn scores(&self) -> Vec<u32> {
        self.slots().iter().map(|s| s.score).collect()
    }

    /// 新しいゲーム: 得点・クールダウン・履歴を全て消す
    pub fn reset_scores(&mut self) {
        for slot in &mut self.slots {
            slot.reset_all();
        }
        info!("scores reset");
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn clear_judgements(&mut self) {
        for slot in &mut self.slots {
            slot.match_streak = 0;
            slot.similarity = None;
            slot.matched = None;
        }
    }
}
