pub mod assign;
pub mod slot;
pub mod smooth;

pub use assign::{pose_center, Assignment, IdentityAssigner, PoseAnchor};
pub use slot::{PlayerSlot, MAX_PLAYERS};
pub use smooth::{DropoutPolicy, JointGroup, KeypointSmoother, JOINT_GROUPS};
