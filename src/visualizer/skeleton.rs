// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! OpenPose BODY_25 body model.

/// Number of body joints.
pub const NUM_JOINTS: usize = 25;

/// Heatmap channels: one per joint plus the background map.
pub const HEATMAP_CHANNELS: usize = NUM_JOINTS + 1;

/// Part affinity field channels: an (x, y) pair per limb.
pub const PAF_CHANNELS: usize = 2 * NUM_LIMBS;

/// Number of limbs.
pub const NUM_LIMBS: usize = 26;

/// Joint names, indexed by joint id.
pub const JOINT_NAMES: [&str; NUM_JOINTS] = [
    "Nose",
    "Neck",
    "RShoulder",
    "RElbow",
    "RWrist",
    "LShoulder",
    "LElbow",
    "LWrist",
    "MidHip",
    "RHip",
    "RKnee",
    "RAnkle",
    "LHip",
    "LKnee",
    "LAnkle",
    "REye",
    "LEye",
    "REar",
    "LEar",
    "LBigToe",
    "LSmallToe",
    "LHeel",
    "RBigToe",
    "RSmallToe",
    "RHeel",
];

/// BODY_25 limbs as (joint a, joint b), in the order they are assembled.
pub const LIMBS: [[usize; 2]; NUM_LIMBS] = [
    [1, 8],   // neck to mid hip
    [1, 2],   // neck to right shoulder
    [1, 5],   // neck to left shoulder
    [2, 3],   // right shoulder to right elbow
    [3, 4],   // right elbow to right wrist
    [5, 6],   // left shoulder to left elbow
    [6, 7],   // left elbow to left wrist
    [8, 9],   // mid hip to right hip
    [9, 10],  // right hip to right knee
    [10, 11], // right knee to right ankle
    [8, 12],  // mid hip to left hip
    [12, 13], // left hip to left knee
    [13, 14], // left knee to left ankle
    [1, 0],   // neck to nose
    [0, 15],  // nose to right eye
    [15, 17], // right eye to right ear
    [0, 16],  // nose to left eye
    [16, 18], // left eye to left ear
    [2, 17],  // right shoulder to right ear
    [5, 18],  // left shoulder to left ear
    [14, 19], // left ankle to left big toe
    [19, 20], // left big toe to left small toe
    [14, 21], // left ankle to left heel
    [11, 22], // right ankle to right big toe
    [22, 23], // right big toe to right small toe
    [11, 24], // right ankle to right heel
];

/// PAF channel pair (x, y) for each entry of [`LIMBS`].
pub const PAF_INDICES: [[usize; 2]; NUM_LIMBS] = [
    [0, 1],
    [14, 15],
    [22, 23],
    [16, 17],
    [18, 19],
    [24, 25],
    [26, 27],
    [6, 7],
    [2, 3],
    [4, 5],
    [8, 9],
    [10, 11],
    [12, 13],
    [30, 31],
    [32, 33],
    [36, 37],
    [34, 35],
    [38, 39],
    [20, 21],
    [28, 29],
    [40, 41],
    [42, 43],
    [44, 45],
    [46, 47],
    [48, 49],
    [50, 51],
];

/// Limb color indices mapping to `POSE_COLORS`.
/// Torso=yellow, right side=orange, left side=blue, face=green.
pub const LIMB_COLOR_INDICES: [usize; NUM_LIMBS] = [
    3, 0, 9, 0, 0, 9, 9, 0, 0, 0, 9, 9, 9, 16, 16, 16, 16, 16, 16, 16, 9, 9, 9, 0, 0, 0,
];

/// Keypoint color indices mapping to `POSE_COLORS`.
pub const KPT_COLOR_INDICES: [usize; NUM_JOINTS] = [
    16, 3, 0, 0, 0, 9, 9, 9, 3, 0, 0, 0, 9, 9, 9, 16, 16, 16, 16, 9, 9, 9, 0, 0, 0,
];
