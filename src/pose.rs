//! Camera pose conventions.
//!
//! Reconstruction engines report poses as world-to-camera transforms
//! (`p_cam = R * p_world + t`). Everything downstream of the engine adapter
//! keeps the camera-to-world pose instead, so the camera center and axes read
//! directly in world space. The two are separate types and only meet through
//! [`WorldToCamera::to_camera_to_world`] and [`CameraToWorld::to_world_to_camera`].
//!
//! Rotations are stored as plain matrices and assumed orthonormal; the
//! conversion transposes them without re-orthogonalization.

use nalgebra as na;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldToCamera {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraToWorld {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

impl WorldToCamera {
    pub fn new(rotation: na::Matrix3<f64>, translation: na::Vector3<f64>) -> WorldToCamera {
        WorldToCamera {
            rotation,
            translation,
        }
    }

    pub fn from_quaternion(
        quaternion: na::Quaternion<f64>,
        translation: na::Vector3<f64>,
    ) -> WorldToCamera {
        let rotation = na::UnitQuaternion::from_quaternion(quaternion)
            .to_rotation_matrix()
            .into_inner();
        WorldToCamera {
            rotation,
            translation,
        }
    }

    /// `R_c2w = R_w2c^T`, `t_c2w = -R_c2w * t_w2c`.
    pub fn to_camera_to_world(&self) -> CameraToWorld {
        let rotation = self.rotation.transpose();
        CameraToWorld {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    pub fn transform_point(&self, p_world: &na::Point3<f64>) -> na::Point3<f64> {
        na::Point3::from(self.rotation * p_world.coords + self.translation)
    }

    /// `P = K * [R | t]`.
    pub fn projection_matrix(&self, intrinsics: &na::Matrix3<f64>) -> na::Matrix3x4<f64> {
        let mut rt = na::Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        rt.set_column(3, &self.translation);
        intrinsics * rt
    }
}

impl CameraToWorld {
    pub fn new(rotation: na::Matrix3<f64>, translation: na::Vector3<f64>) -> CameraToWorld {
        CameraToWorld {
            rotation,
            translation,
        }
    }

    pub fn to_world_to_camera(&self) -> WorldToCamera {
        let rotation = self.rotation.transpose();
        WorldToCamera {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Camera center in world coordinates.
    pub fn center(&self) -> na::Point3<f64> {
        na::Point3::from(self.translation)
    }

    /// Viewing direction (camera +z) in world coordinates.
    pub fn optical_axis(&self) -> na::Vector3<f64> {
        self.rotation.column(2).into_owned()
    }
}

impl From<WorldToCamera> for CameraToWorld {
    fn from(pose: WorldToCamera) -> CameraToWorld {
        pose.to_camera_to_world()
    }
}

impl From<CameraToWorld> for WorldToCamera {
    fn from(pose: CameraToWorld) -> WorldToCamera {
        pose.to_world_to_camera()
    }
}

/// Simple-pinhole calibration matrix.
pub fn pinhole_matrix(focal: f64, cx: f64, cy: f64) -> na::Matrix3<f64> {
    na::Matrix3::new(focal, 0.0, cx, 0.0, focal, cy, 0.0, 0.0, 1.0)
}
