//! Frame-driven main loop: read a frame, estimate poses, feed the session.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DetectorError;
use crate::pose::{EstimateConfig, PoseDetector};
use crate::session::{FrameReport, GameSession};

/// フレームの供給元（カメラ、録画など）
pub trait FrameSource {
    type Frame;

    /// 読めるフレームが無ければ None（そのティックは何もしない）
    fn read_frame(&mut self) -> Option<Self::Frame>;

    fn frame_width(&self) -> f32;

    /// これ以上フレームが来ないなら true
    fn is_finished(&self) -> bool {
        false
    }
}

/// 録画再生用: フレーム番号 0..total を順に返す
#[derive(Debug, Clone)]
pub struct ReplayFrames {
    next: usize,
    total: usize,
    frame_width: f32,
}

impl ReplayFrames {
    pub fn new(total: usize, frame_width: f32) -> Self {
        Self { next: 0, total, frame_width }
    }
}

impl FrameSource for ReplayFrames {
    type Frame = usize;

    fn read_frame(&mut self) -> Option<usize> {
        if self.next >= self.total {
            return None;
        }
        let frame = self.next;
        self.next += 1;
        Some(frame)
    }

    fn frame_width(&self) -> f32 {
        self.frame_width
    }

    fn is_finished(&self) -> bool {
        self.next >= self.total
    }
}

/// 1ティックの結果
#[derive(Debug)]
pub enum TickOutcome {
    NoFrame,
    /// 推定失敗またはタイムアウト。セッションは変化しない。
    Skipped(DetectorError),
    Processed(FrameReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub processed: u64,
    pub no_frame: u64,
    pub skipped: u64,
}

pub struct FrameLoop<S, D> {
    source: S,
    detector: D,
    session: GameSession,
    estimate: EstimateConfig,
    timeout: Duration,
    frame_interval: Duration,
}

impl<S, D> FrameLoop<S, D>
where
    S: FrameSource,
    D: PoseDetector<Frame = S::Frame>,
{
    pub fn new(source: S, detector: D, session: GameSession, config: &Config) -> Self {
        let fps = config.app.target_fps.max(1) as f64;
        Self {
            source,
            detector,
            session,
            estimate: EstimateConfig::from(&config.detector),
            timeout: config.detector.timeout(),
            frame_interval: Duration::from_secs_f64(1.0 / fps),
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    pub fn into_session(self) -> GameSession {
        self.session
    }

    pub fn is_source_finished(&self) -> bool {
        self.source.is_finished()
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let Some(frame) = self.source.read_frame() else {
            return TickOutcome::NoFrame;
        };

        let estimate = self.detector.estimate(&frame, &self.estimate);
        let detections = match time::timeout(self.timeout, estimate).await {
            Ok(Ok(detections)) => detections,
            Ok(Err(e)) => {
                warn!(error = %e, "pose estimation failed; frame skipped");
                return TickOutcome::Skipped(e);
            }
            Err(_) => {
                let e = DetectorError::Timeout(self.timeout);
                warn!(error = %e, "frame skipped");
                return TickOutcome::Skipped(e);
            }
        };

        let report = self.session.process_frame(
            &detections,
            self.source.frame_width(),
            Instant::now().into_std(),
        );
        TickOutcome::Processed(report)
    }

    /// ソースが尽きるまで target_fps で回す
    pub async fn run<F>(&mut self, mut on_frame: F) -> LoopStats
    where
        F: FnMut(&FrameReport),
    {
        let mut stats = LoopStats::default();
        let mut interval = time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fps_timer = Instant::now();
        let mut fps_frames = 0u32;

        info!(interval_ms = self.frame_interval.as_millis() as u64, "frame loop started");
        while !self.source.is_finished() {
            interval.tick().await;
            stats.ticks += 1;

            match self.tick().await {
                TickOutcome::NoFrame => stats.no_frame += 1,
                TickOutcome::Skipped(_) => stats.skipped += 1,
                TickOutcome::Processed(report) => {
                    stats.processed += 1;
                    fps_frames += 1;
                    on_frame(&report);
                }
            }

            let elapsed = fps_timer.elapsed();
            if elapsed >= Duration::from_secs(1) {
                debug!(fps = fps_frames as f32 / elapsed.as_secs_f32(), "frame rate");
                fps_timer = Instant::now();
                fps_frames = 0;
            }
        }
        info!(
            processed = stats.processed,
            skipped = stats.skipped,
            "frame loop finished"
        );
        stats
    }
}
