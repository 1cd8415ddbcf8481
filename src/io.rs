use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::calibrator::CalibrationSession;
use crate::types::{ImageRecord, Locator};
use crate::util::{finite_mean, finite_median, finite_or_none};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("cannot read image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Serializes an object to a pretty JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<(), IoError> {
    let j = serde_json::to_string_pretty(object)?;
    fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T, IoError> {
    let contents = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// An image entry of a job file. Missing dimensions are read from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobImage {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Images and locators to calibrate, as written by the editor or
/// `scene_generator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationJob {
    pub images: Vec<JobImage>,
    pub locators: Vec<Locator>,
}

impl CalibrationJob {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        object_from_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        object_to_json(path, self)
    }

    /// Image records in job order. Relative paths are resolved against `base_dir`.
    pub fn resolve_images(&self, base_dir: &Path) -> Result<Vec<ImageRecord>, IoError> {
        self.images
            .iter()
            .map(|img| {
                let path = if img.path.is_relative() {
                    base_dir.join(&img.path)
                } else {
                    img.path.clone()
                };
                let (width, height) = match (img.width, img.height) {
                    (Some(w), Some(h)) => (w, h),
                    _ => image::image_dimensions(&path).map_err(|source| IoError::Image {
                        path: path.clone(),
                        source,
                    })?,
                };
                Ok(ImageRecord::new(path, width, height))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    pub index: usize,
    pub path: PathBuf,
    pub registered: bool,
    pub intrinsics: Option<nalgebra::Matrix3<f64>>,
    pub rotation: Option<nalgebra::Matrix3<f64>>,
    pub translation: Option<nalgebra::Vector3<f64>>,
    /// Mean reprojection error in pixels; `null` when no observation could be scored.
    pub error_px: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorReport {
    pub name: String,
    pub observations: usize,
    /// Mean reprojection error in pixels; `null` when the locator is unresolved.
    pub error_px: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub timestamp: i64,
    pub registered_images: usize,
    pub total_images: usize,
    pub points3d: usize,
    pub mean_locator_error_px: Option<f64>,
    pub median_locator_error_px: Option<f64>,
    pub unresolved_locators: Vec<String>,
    pub images: Vec<ImageReport>,
    pub locators: Vec<LocatorReport>,
}

impl CalibrationReport {
    pub fn from_session(session: &CalibrationSession) -> CalibrationReport {
        let result = session.result();
        let images = session
            .images()
            .iter()
            .enumerate()
            .map(|(index, img)| {
                let camera = result.and_then(|r| r.camera(index));
                ImageReport {
                    index,
                    path: img.path.clone(),
                    registered: camera.is_some(),
                    intrinsics: camera.as_ref().map(|c| c.intrinsics),
                    rotation: camera.as_ref().map(|c| c.rotation),
                    translation: camera.as_ref().map(|c| c.translation),
                    error_px: session
                        .image_errors()
                        .get(&index)
                        .copied()
                        .and_then(finite_or_none),
                }
            })
            .collect();

        let locator_errors: Vec<f64> = session
            .locators()
            .iter()
            .map(|l| l.error.unwrap_or(f64::INFINITY))
            .collect();
        let locators = session
            .locators()
            .iter()
            .map(|l| LocatorReport {
                name: l.name.clone(),
                observations: l.positions.len(),
                error_px: l.error.and_then(finite_or_none),
            })
            .collect();
        let unresolved_locators = session
            .locators()
            .iter()
            .filter(|l| l.error.is_some_and(|e| !e.is_finite()))
            .map(|l| l.name.clone())
            .collect();

        let timestamp = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
            .unix_timestamp();

        CalibrationReport {
            timestamp,
            registered_images: result.map_or(0, |r| r.registered_image_indices.len()),
            total_images: session.images().len(),
            points3d: result.map_or(0, |r| r.points3d.len()),
            mean_locator_error_px: finite_mean(&locator_errors),
            median_locator_error_px: finite_median(&locator_errors),
            unresolved_locators,
            images,
            locators,
        }
    }
}

/// Writes the JSON report of a calibrated session.
pub fn write_detailed_report(
    output_path: impl AsRef<Path>,
    session: &CalibrationSession,
) -> Result<CalibrationReport, IoError> {
    let report = CalibrationReport::from_session(session);
    object_to_json(output_path, &report)?;
    Ok(report)
}

/// Writes a short human-readable summary.
pub fn write_report(output_path: impl AsRef<Path>, session: &CalibrationSession) -> Result<(), IoError> {
    let report = CalibrationReport::from_session(session);
    let fmt_err = |e: Option<f64>| match e {
        Some(v) => format!("{:.5} px", v),
        None => "inf".to_string(),
    };
    let mut s = String::new();
    s += format!(
        "Registered images: {} / {}\n",
        report.registered_images, report.total_images
    )
    .as_str();
    s += format!("3D points: {}\n\n", report.points3d).as_str();
    s += format!(
        "average locator error: {}\n",
        fmt_err(report.mean_locator_error_px)
    )
    .as_str();
    s += format!(
        "median  locator error: {}\n\n",
        fmt_err(report.median_locator_error_px)
    )
    .as_str();
    for img in &report.images {
        s += format!("image{} ({}):\n", img.index, img.path.display()).as_str();
        s += format!("    registered: {}\n", img.registered).as_str();
        s += format!("    reprojection error: {}\n\n", fmt_err(img.error_px)).as_str();
    }
    for loc in &report.locators {
        s += format!("{}: {}\n", loc.name, fmt_err(loc.error_px)).as_str();
    }
    fs::write(output_path, s)?;
    Ok(())
}
