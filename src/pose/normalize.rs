use serde::Serialize;

use super::keypoint::{KeypointMap, KeypointName, Point2};

/// 肩幅がこれより小さい場合はこの値で割る
pub const MIN_SCALE: f32 = 1.0;

/// 肩中心・肩幅スケールの身体座標系に変換した姿勢
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedPose {
    points: [Option<Point2>; KeypointName::COUNT],
}

impl NormalizedPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: KeypointName) -> Option<Point2> {
        self.points[name.index()]
    }

    pub fn set(&mut self, name: KeypointName, point: Point2) {
        self.points[name.index()] = Some(point);
    }

    pub fn with(mut self, name: KeypointName, x: f32, y: f32) -> Self {
        self.set(name, Point2::new(x, y));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeypointName, Point2)> + '_ {
        KeypointName::ALL
            .iter()
            .filter_map(move |&name| self.get(name).map(|p| (name, p)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    /// 正規化済みの点を信頼度1のキーポイントとして戻す
    pub fn to_keypoint_map(&self) -> KeypointMap {
        self.iter()
            .map(|(name, p)| super::keypoint::Keypoint::new(name, p.x, p.y, 1.0))
            .collect()
    }
}

impl Serialize for NormalizedPose {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(name, p)| (name, [p.x, p.y])))
    }
}

/// 両肩を基準に平行移動・スケールを除去する。
///
/// 肩のどちらかが欠けているか閾値未満なら None。
/// 閾値未満のキーポイントは出力から除外する（0埋めしない）。
pub fn normalize(map: &KeypointMap, min_score: f32) -> Option<NormalizedPose> {
    let left = map.confident(KeypointName::LeftShoulder, min_score)?;
    let right = map.confident(KeypointName::RightShoulder, min_score)?;

    let center = left.position().midpoint(&right.position());
    let scale = left.position().distance(&right.position()).max(MIN_SCALE);

    let mut out = NormalizedPose::new();
    for kp in map.iter().filter(|kp| kp.is_valid(min_score)) {
        out.set(
            kp.name,
            Point2::new((kp.x - center.x) / scale, (kp.y - center.y) / scale),
        );
    }
    Some(out)
}
