//! Error types.
//!
//! Nothing inside the per-frame pass is an error: missing keypoints and
//! failed normalization are plain values. Errors only come from the
//! configuration surface and the detector boundary.

use std::time::Duration;

use thiserror::Error;

/// 設定値の検証エラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("player count must be within 1..={max}, got {got}")]
    PlayerCount { got: usize, max: usize },

    #[error("{field} must be within {min}..={max}, got {got}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        got: f32,
    },

    #[error("{field} must be a positive finite number, got {got}")]
    NotPositive { field: &'static str, got: f32 },

    #[error("difficulty thresholds for {policy} must increase easy < normal < hard")]
    Thresholds { policy: &'static str },

    #[error("{0}")]
    Invalid(String),
}

/// 検出器呼び出しのエラー。フレームループはこれを受けてフレームを捨てる。
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("pose estimation failed: {0}")]
    Estimate(String),

    #[error("pose estimation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("malformed replay line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("replay input: {0}")]
    Io(#[from] std::io::Error),
}
