use serde::{Deserialize, Serialize};

/// MoveNet の 17 キーポイント名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum KeypointName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 検出器が出力する名前 (e.g. "left_wrist")
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

impl std::fmt::Display for KeypointName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 2D 座標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// 単一キーポイント (検出器のピクセル座標)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    #[serde(default = "default_keypoint_score")]
    pub score: f32,
}

fn default_keypoint_score() -> f32 {
    1.0
}

impl Keypoint {
    pub fn new(name: KeypointName, x: f32, y: f32, score: f32) -> Self {
        Self { name, x, y, score }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.score >= threshold
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// 検出器が1人分として返す骨格。フレーム内でのみ使われる。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Skeleton {
    pub keypoints: Vec<Keypoint>,
    /// 検出全体の信頼度
    #[serde(default = "default_keypoint_score")]
    pub score: f32,
}

impl Skeleton {
    pub fn new(keypoints: Vec<Keypoint>, score: f32) -> Self {
        Self { keypoints, score }
    }

    /// 名前付きマップに変換。同名が複数あればスコアの高い方を採用。
    pub fn to_map(&self) -> KeypointMap {
        let mut map = KeypointMap::new();
        for kp in &self.keypoints {
            match map.get(kp.name) {
                Some(existing) if existing.score >= kp.score => {}
                _ => map.insert(*kp),
            }
        }
        map
    }
}

/// 部位名でひけるキーポイント集合。欠損は None (原点扱いしない)。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointMap {
    entries: [Option<Keypoint>; KeypointName::COUNT],
}

impl KeypointMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: KeypointName) -> Option<&Keypoint> {
        self.entries[name.index()].as_ref()
    }

    /// 閾値以上のときだけ返す
    pub fn confident(&self, name: KeypointName, threshold: f32) -> Option<&Keypoint> {
        self.get(name).filter(|kp| kp.is_valid(threshold))
    }

    pub fn insert(&mut self, keypoint: Keypoint) {
        self.entries[keypoint.name.index()] = Some(keypoint);
    }

    pub fn remove(&mut self, name: KeypointName) -> Option<Keypoint> {
        self.entries[name.index()].take()
    }

    pub fn clear(&mut self) {
        self.entries = [None; KeypointName::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }
}

impl FromIterator<Keypoint> for KeypointMap {
    fn from_iter<I: IntoIterator<Item = Keypoint>>(iter: I) -> Self {
        let mut map = KeypointMap::new();
        for kp in iter {
            map.insert(kp);
        }
        map
    }
}

impl Serialize for KeypointMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
