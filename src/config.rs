use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;
use crate::pose::TargetPoseDef;
use crate::scoring::ScoringPolicy;
use crate::similarity::{Difficulty, DifficultyThresholds, SimilarityPolicy};
use crate::tracker::{DropoutPolicy, MAX_PLAYERS};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub smooth: SmoothConfig,
    #[serde(default)]
    pub assign: AssignConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// tracing のフィルタ ("info", "pose_match=debug" など)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_target_fps() -> u32 { 30 }
fn default_log_level() -> String { "info".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub difficulty: Difficulty,
    /// 参加人数 (1〜4)
    #[serde(default = "default_player_count")]
    pub player_count: usize,
    /// 加点後のクールダウン（ミリ秒）
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// これ未満のキーポイントは「不明」扱い
    #[serde(default = "default_min_keypoint_score")]
    pub min_keypoint_score: f32,
    #[serde(default)]
    pub similarity: SimilarityPolicy,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

fn default_player_count() -> usize { MAX_PLAYERS }
fn default_cooldown_ms() -> u64 { 2500 }
fn default_min_keypoint_score() -> f32 { 0.25 }

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            player_count: default_player_count(),
            cooldown_ms: default_cooldown_ms(),
            min_keypoint_score: default_min_keypoint_score(),
            similarity: SimilarityPolicy::default(),
            scoring: ScoringPolicy::default(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// 現在の類似度方式に対応する合格ライン
    pub fn thresholds_for(&self, policy: &SimilarityPolicy) -> DifficultyThresholds {
        match policy {
            SimilarityPolicy::ArmState => self.thresholds.arm_state,
            SimilarityPolicy::Distance { .. } => self.thresholds.distance,
        }
    }
}

/// 類似度方式ごとの難易度別合格ライン
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_arm_state_thresholds")]
    pub arm_state: DifficultyThresholds,
    #[serde(default = "default_distance_thresholds")]
    pub distance: DifficultyThresholds,
}

fn default_arm_state_thresholds() -> DifficultyThresholds { DifficultyThresholds::ARM_STATE }
fn default_distance_thresholds() -> DifficultyThresholds { DifficultyThresholds::DISTANCE }

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            arm_state: default_arm_state_thresholds(),
            distance: default_distance_thresholds(),
        }
    }
}

/// 平滑化の反映率（新しい観測値の重み。小さいほど滑らか）
#[derive(Debug, Clone, Deserialize)]
pub struct SmoothConfig {
    /// 肩・腰
    #[serde(default = "default_torso")]
    pub torso: f32,
    /// 肘・膝
    #[serde(default = "default_limbs")]
    pub limbs: f32,
    /// 足首・顔
    #[serde(default = "default_extremities")]
    pub extremities: f32,
    /// 手首
    #[serde(default = "default_hands")]
    pub hands: f32,
    /// 1フレームでの移動上限（ピクセル）
    #[serde(default = "default_max_jump_pixels")]
    pub max_jump_pixels: f32,
    /// 上限を超えたフレームの反映率の倍率
    #[serde(default = "default_jump_alpha_factor")]
    pub jump_alpha_factor: f32,
    #[serde(default)]
    pub dropout: DropoutPolicy,
}

fn default_torso() -> f32 { 0.5 }
fn default_limbs() -> f32 { 0.4 }
fn default_extremities() -> f32 { 0.3 }
fn default_hands() -> f32 { 0.2 }
fn default_max_jump_pixels() -> f32 { 300.0 }
fn default_jump_alpha_factor() -> f32 { 0.5 }

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            torso: default_torso(),
            limbs: default_limbs(),
            extremities: default_extremities(),
            hands: default_hands(),
            max_jump_pixels: default_max_jump_pixels(),
            jump_alpha_factor: default_jump_alpha_factor(),
            dropout: DropoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignConfig {
    #[serde(default = "default_center_weight")]
    pub center_weight: f32,
    #[serde(default = "default_hand_weight")]
    pub left_hand_weight: f32,
    #[serde(default = "default_hand_weight")]
    pub right_hand_weight: f32,
    /// 画面幅に対するこの割合以上動いたら別人
    #[serde(default = "default_max_distance_fraction")]
    pub max_distance_fraction: f32,
    /// 前フレームの中心からこの距離以内なら加点
    #[serde(default = "default_sticky_distance")]
    pub sticky_distance: f32,
    #[serde(default = "default_sticky_factor")]
    pub sticky_factor: f32,
    /// 重み付き距離の差がこの範囲内の候補どうしでだけ加点で順位を決める
    #[serde(default = "default_sticky_margin")]
    pub sticky_margin: f32,
    /// 手首が見えないときの中心からの横オフセット（ピクセル）
    #[serde(default = "default_hand_fallback_offset")]
    pub hand_fallback_offset: f32,
}

fn default_center_weight() -> f32 { 0.4 }
fn default_hand_weight() -> f32 { 0.3 }
fn default_max_distance_fraction() -> f32 { 1.0 / 3.0 }
fn default_sticky_distance() -> f32 { 350.0 }
fn default_sticky_factor() -> f32 { 1.5 }
fn default_sticky_margin() -> f32 { 20.0 }
fn default_hand_fallback_offset() -> f32 { 80.0 }

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            center_weight: default_center_weight(),
            left_hand_weight: default_hand_weight(),
            right_hand_weight: default_hand_weight(),
            max_distance_fraction: default_max_distance_fraction(),
            sticky_distance: default_sticky_distance(),
            sticky_factor: default_sticky_factor(),
            sticky_margin: default_sticky_margin(),
            hand_fallback_offset: default_hand_fallback_offset(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_max_poses")]
    pub max_poses: usize,
    /// 左右反転した座標を返させる
    #[serde(default = "default_mirror_horizontally")]
    pub mirror_horizontally: bool,
    /// これ未満の検出は捨てる
    #[serde(default = "default_min_pose_score")]
    pub min_pose_score: f32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 記録済み検出 (JSON lines)
    #[serde(default = "default_replay_path")]
    pub replay_path: String,
    #[serde(default = "default_frame_width")]
    pub frame_width: f32,
}

fn default_max_poses() -> usize { MAX_PLAYERS }
fn default_mirror_horizontally() -> bool { true }
fn default_min_pose_score() -> f32 { 0.15 }
fn default_timeout_ms() -> u64 { 500 }
fn default_replay_path() -> String { "detections.jsonl".to_string() }
fn default_frame_width() -> f32 { 640.0 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_poses: default_max_poses(),
            mirror_horizontally: default_mirror_horizontally(),
            min_pose_score: default_min_pose_score(),
            timeout_ms: default_timeout_ms(),
            replay_path: default_replay_path(),
            frame_width: default_frame_width(),
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetsConfig {
    /// 0 なら自動送りしない
    #[serde(default)]
    pub auto_advance_secs: f32,
    /// 指定すると組み込みのお題を置き換える
    #[serde(default)]
    pub poses: Option<Vec<TargetPoseDef>>,
}

impl TargetsConfig {
    pub fn auto_advance(&self) -> Option<Duration> {
        if self.auto_advance_secs > 0.0 {
            Duration::try_from_secs_f32(self.auto_advance_secs).ok()
        } else {
            None
        }
    }
}

fn check_range(field: &'static str, got: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if got.is_finite() && got >= min && got <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, min, max, got })
    }
}

fn check_alpha(field: &'static str, got: f32) -> Result<(), ConfigError> {
    if got.is_finite() && got > 0.0 && got <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, min: 0.0, max: 1.0, got })
    }
}

fn check_positive(field: &'static str, got: f32) -> Result<(), ConfigError> {
    if got.is_finite() && got > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, got })
    }
}

pub fn check_player_count(count: usize) -> Result<(), ConfigError> {
    if (1..=MAX_PLAYERS).contains(&count) {
        Ok(())
    } else {
        Err(ConfigError::PlayerCount { got: count, max: MAX_PLAYERS })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読めなければ警告してデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_player_count(self.game.player_count)?;
        check_range("game.min_keypoint_score", self.game.min_keypoint_score, 0.0, 1.0)?;
        if let SimilarityPolicy::Distance { sensitivity } = self.game.similarity {
            check_positive("game.similarity.sensitivity", sensitivity)?;
        }
        if let ScoringPolicy::Hold { hold_frames, miss_penalty } = self.game.scoring {
            if hold_frames == 0 {
                return Err(ConfigError::Invalid("game.scoring.hold_frames must be at least 1".to_string()));
            }
            // 不一致では一致1回分より大きく戻す
            if miss_penalty < 2 {
                return Err(ConfigError::Invalid("game.scoring.miss_penalty must be at least 2".to_string()));
            }
        }
        if !self.game.thresholds.arm_state.is_increasing() {
            return Err(ConfigError::Thresholds { policy: "arm_state" });
        }
        if !self.game.thresholds.distance.is_increasing() {
            return Err(ConfigError::Thresholds { policy: "distance" });
        }

        check_alpha("smooth.torso", self.smooth.torso)?;
        check_alpha("smooth.limbs", self.smooth.limbs)?;
        check_alpha("smooth.extremities", self.smooth.extremities)?;
        check_alpha("smooth.hands", self.smooth.hands)?;
        check_alpha("smooth.jump_alpha_factor", self.smooth.jump_alpha_factor)?;
        if self.smooth.jump_alpha_factor >= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "smooth.jump_alpha_factor",
                min: 0.0,
                max: 1.0,
                got: self.smooth.jump_alpha_factor,
            });
        }
        check_positive("smooth.max_jump_pixels", self.smooth.max_jump_pixels)?;

        let a = &self.assign;
        for (field, weight) in [
            ("assign.center_weight", a.center_weight),
            ("assign.left_hand_weight", a.left_hand_weight),
            ("assign.right_hand_weight", a.right_hand_weight),
        ] {
            check_range(field, weight, 0.0, f32::MAX)?;
        }
        check_positive(
            "assign weights (sum)",
            a.center_weight + a.left_hand_weight + a.right_hand_weight,
        )?;
        check_positive("assign.max_distance_fraction", a.max_distance_fraction)?;
        check_range("assign.sticky_distance", a.sticky_distance, 0.0, f32::MAX)?;
        check_range("assign.sticky_factor", a.sticky_factor, 0.0, f32::MAX)?;
        check_range("assign.sticky_margin", a.sticky_margin, 0.0, f32::MAX)?;
        check_range("assign.hand_fallback_offset", a.hand_fallback_offset, 0.0, f32::MAX)?;

        if self.detector.max_poses == 0 {
            return Err(ConfigError::Invalid("detector.max_poses must be at least 1".to_string()));
        }
        check_range("detector.min_pose_score", self.detector.min_pose_score, 0.0, 1.0)?;
        check_positive("detector.frame_width", self.detector.frame_width)?;

        if self.app.target_fps == 0 {
            return Err(ConfigError::Invalid("app.target_fps must be at least 1".to_string()));
        }
        let secs = self.targets.auto_advance_secs;
        if secs < 0.0 || Duration::try_from_secs_f32(secs).is_err() {
            return Err(ConfigError::NotPositive {
                field: "targets.auto_advance_secs",
                got: self.targets.auto_advance_secs,
            });
        }
        if matches!(&self.targets.poses, Some(poses) if poses.is_empty()) {
            return Err(ConfigError::Invalid("targets.poses must not be empty".to_string()));
        }
        Ok(())
    }
}
