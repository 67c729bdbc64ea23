use std::fs::File;
use std::future::Future;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::keypoint::Skeleton;

/// 検出器への推論設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateConfig {
    pub max_poses: usize,
    /// 左右反転した座標を返す
    pub mirror_horizontally: bool,
}

impl From<&DetectorConfig> for EstimateConfig {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            max_poses: config.max_poses,
            mirror_horizontally: config.mirror_horizontally,
        }
    }
}

/// 姿勢推定モデル。1フレームから複数人の骨格を返す（非同期、失敗しうる）。
pub trait PoseDetector {
    type Frame;

    fn estimate(
        &mut self,
        frame: &Self::Frame,
        config: &EstimateConfig,
    ) -> impl Future<Output = Result<Vec<Skeleton>, DetectorError>>;
}

/// 記録済みの検出結果を再生する検出器。
///
/// 入力は JSON lines で、1行が1フレーム分の骨格の配列。空行は無視。
pub struct ReplayDetector {
    frames: Vec<Vec<Skeleton>>,
    frame_width: f32,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Skeleton>>, frame_width: f32) -> Self {
        Self { frames, frame_width }
    }

    pub fn open<P: AsRef<Path>>(path: P, frame_width: f32) -> Result<Self, DetectorError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), frame_width)
    }

    pub fn from_reader<R: BufRead>(reader: R, frame_width: f32) -> Result<Self, DetectorError> {
        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let skeletons: Vec<Skeleton> = serde_json::from_str(&line)
                .map_err(|source| DetectorError::Replay { line: i + 1, source })?;
            frames.push(skeletons);
        }
        Ok(Self::new(frames, frame_width))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_width(&self) -> f32 {
        self.frame_width
    }
}

impl PoseDetector for ReplayDetector {
    /// フレーム番号
    type Frame = usize;

    async fn estimate(
        &mut self,
        frame: &usize,
        config: &EstimateConfig,
    ) -> Result<Vec<Skeleton>, DetectorError> {
        let recorded = self
            .frames
            .get(*frame)
            .ok_or_else(|| DetectorError::Estimate(format!("no recorded frame {}", frame)))?;

        let mut skeletons: Vec<Skeleton> = recorded.iter().take(config.max_poses).cloned().collect();
        if config.mirror_horizontally {
            for kp in skeletons.iter_mut().flat_map(|s| s.keypoints.iter_mut()) {
                kp.x = self.frame_width - kp.x;
            }
        }
        Ok(skeletons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::KeypointName;

    const LINES: &str = r#"[{"keypoints":[{"name":"nose","x":100.0,"y":50.0,"score":0.9}],"score":0.8}]

[]
[{"keypoints":[],"score":0.5},{"keypoints":[],"score":0.4},{"keypoints":[],"score":0.3}]
"#;

    fn no_mirror(max_poses: usize) -> EstimateConfig {
        EstimateConfig { max_poses, mirror_horizontally: false }
    }

    #[test]
    fn test_from_reader_skips_blank_lines() {
        let detector = ReplayDetector::from_reader(LINES.as_bytes(), 640.0).unwrap();
        assert_eq!(detector.frame_count(), 3);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "[]\n{not json}\n";
        match ReplayDetector::from_reader(input.as_bytes(), 640.0) {
            Err(DetectorError::Replay { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other.map(|d| d.frame_count())),
        }
    }

    #[tokio::test]
    async fn test_estimate_returns_recorded_frame() {
        let mut detector = ReplayDetector::from_reader(LINES.as_bytes(), 640.0).unwrap();
        let poses = detector.estimate(&0, &no_mirror(4)).await.unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].keypoints[0].name, KeypointName::Nose);
        assert_eq!(poses[0].keypoints[0].x, 100.0);
        assert!(detector.estimate(&1, &no_mirror(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_estimate_respects_max_poses() {
        let mut detector = ReplayDetector::from_reader(LINES.as_bytes(), 640.0).unwrap();
        let poses = detector.estimate(&2, &no_mirror(2)).await.unwrap();
        assert_eq!(poses.len(), 2);
    }

    #[tokio::test]
    async fn test_estimate_mirrors() {
        let mut detector = ReplayDetector::from_reader(LINES.as_bytes(), 640.0).unwrap();
        let config = EstimateConfig { max_poses: 4, mirror_horizontally: true };
        let poses = detector.estimate(&0, &config).await.unwrap();
        assert_eq!(poses[0].keypoints[0].x, 540.0);
        assert_eq!(poses[0].keypoints[0].y, 50.0);
    }

    #[tokio::test]
    async fn test_estimate_past_end_fails() {
        let mut detector = ReplayDetector::new(Vec::new(), 640.0);
        assert!(detector.estimate(&0, &no_mirror(4)).await.is_err());
    }
}
