pub mod detector;
pub mod keypoint;
pub mod normalize;
pub mod target;

pub use detector::{EstimateConfig, PoseDetector, ReplayDetector};
pub use keypoint::{Keypoint, KeypointMap, KeypointName, Point2, Skeleton};
pub use normalize::{normalize, NormalizedPose};
pub use target::{builtin_targets, TargetLibrary, TargetPose, TargetPoseDef};
