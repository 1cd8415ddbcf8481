use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::{IoError, object_from_json};

/// Options for [`crate::engine::colmap::ColmapEngine`].
///
/// Mapper thresholds are relaxed for hand-placed locators: a handful of
/// matches per pair is all an operator provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColmapOptions {
    pub executable: PathBuf,
    /// Parent of the per-run workspace; the system temp dir when unset.
    pub work_root: Option<PathBuf>,
    pub min_num_matches: u32,
    pub init_min_num_inliers: u32,
    pub init_min_tri_angle: f64,
    pub abs_pose_min_num_inliers: u32,
    pub abs_pose_max_error: f64,
    pub filter_min_tri_angle: f64,
}

impl Default for ColmapOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("colmap"),
            work_root: None,
            min_num_matches: 3,
            init_min_num_inliers: 3,
            init_min_tri_angle: 1.0,
            abs_pose_min_num_inliers: 3,
            abs_pose_max_error: 24.0,
            filter_min_tri_angle: 0.0,
        }
    }
}

impl ColmapOptions {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IoError> {
        object_from_json(path)
    }
}
