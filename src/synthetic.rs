//! Synthetic locator scenes with known cameras.

use std::path::PathBuf;

use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::pose::{WorldToCamera, pinhole_matrix};
use crate::types::{ImageRecord, Locator, NormalizedPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub num_cameras: usize,
    pub num_locators: usize,
    pub width: u32,
    pub height: u32,
    pub focal: f64,
    /// Distance from the cameras to the scene center.
    pub radius: f64,
    /// Angle covered by the camera arc, radians.
    pub arc: f64,
    /// Half size of the cube the locators are drawn from.
    pub extent: f64,
    /// Uniform jitter added to each observation, pixels.
    pub pixel_noise: f64,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_cameras: 4,
            num_locators: 12,
            width: 640,
            height: 480,
            focal: 600.0,
            radius: 5.0,
            arc: 0.8,
            extent: 1.0,
            pixel_noise: 0.0,
            seed: 0,
        }
    }
}

pub struct SyntheticScene {
    pub images: Vec<ImageRecord>,
    pub locators: Vec<Locator>,
    pub intrinsics: na::Matrix3<f64>,
    pub poses: Vec<WorldToCamera>,
    pub points: Vec<na::Point3<f64>>,
}

/// World-to-camera pose of a camera at `center` looking at `target`, image
/// y axis pointing down in world.
pub fn look_at(center: na::Point3<f64>, target: na::Point3<f64>) -> WorldToCamera {
    let z = (target - center).normalize();
    let down = na::Vector3::new(0.0, -1.0, 0.0);
    let x = down.cross(&z).normalize();
    let y = z.cross(&x);
    let r_c2w = na::Matrix3::from_columns(&[x, y, z]);
    let rotation = r_c2w.transpose();
    WorldToCamera::new(rotation, -(rotation * center.coords))
}

pub fn project(
    intrinsics: &na::Matrix3<f64>,
    pose: &WorldToCamera,
    point: &na::Point3<f64>,
) -> Option<na::Vector2<f64>> {
    let p_cam = pose.transform_point(point);
    if p_cam.z <= 0.0 {
        return None;
    }
    let uv = intrinsics * (p_cam.coords / p_cam.z);
    Some(na::Vector2::new(uv.x, uv.y))
}

impl SyntheticScene {
    /// Cameras on a horizontal arc around the origin, locators inside a cube.
    /// Only observations that land inside an image are kept.
    pub fn generate(config: &SceneConfig) -> SyntheticScene {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let intrinsics = pinhole_matrix(
            config.focal,
            config.width as f64 / 2.0,
            config.height as f64 / 2.0,
        );

        let poses: Vec<_> = (0..config.num_cameras)
            .map(|i| {
                let t = if config.num_cameras > 1 {
                    i as f64 / (config.num_cameras - 1) as f64 - 0.5
                } else {
                    0.0
                };
                let angle = t * config.arc;
                let center = na::Point3::new(
                    config.radius * angle.sin(),
                    0.3 * config.radius * t,
                    -config.radius * angle.cos(),
                );
                look_at(center, na::Point3::origin())
            })
            .collect();

        let images = (0..config.num_cameras)
            .map(|i| {
                ImageRecord::new(
                    PathBuf::from(format!("{:06}.png", i)),
                    config.width,
                    config.height,
                )
            })
            .collect();

        let e = config.extent;
        let points: Vec<_> = (0..config.num_locators)
            .map(|_| {
                na::Point3::new(
                    rng.random_range(-e..=e),
                    rng.random_range(-e..=e),
                    rng.random_range(-e..=e),
                )
            })
            .collect();

        let (w, h) = (config.width as f64, config.height as f64);
        let locators = points
            .iter()
            .enumerate()
            .map(|(id, p)| {
                let mut locator = Locator::new(format!("loc{}", id));
                for (img_idx, pose) in poses.iter().enumerate() {
                    let Some(mut uv) = project(&intrinsics, pose, p) else {
                        continue;
                    };
                    if config.pixel_noise > 0.0 {
                        let n = config.pixel_noise;
                        uv.x += rng.random_range(-n..=n);
                        uv.y += rng.random_range(-n..=n);
                    }
                    let normalized = NormalizedPoint::new(uv.x / w, uv.y / h);
                    if normalized.is_valid() {
                        locator.positions.insert(img_idx, normalized);
                    }
                }
                locator
            })
            .filter(|l| !l.positions.is_empty())
            .collect();

        SyntheticScene {
            images,
            locators,
            intrinsics,
            poses,
            points,
        }
    }
}
