//! Reader for COLMAP's text model format (`cameras.txt`, `images.txt`,
//! `points3D.txt`).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use log::warn;
use nalgebra as na;

use super::{EngineError, Reconstruction, RegisteredView};
use crate::pose::{WorldToCamera, pinhole_matrix};

#[derive(Debug, Clone, PartialEq)]
pub struct ColmapCamera {
    pub id: u32,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub params: Vec<f64>,
}

impl ColmapCamera {
    /// Calibration matrix for pinhole models; `None` for models with distortion.
    pub fn intrinsics(&self) -> Option<na::Matrix3<f64>> {
        match (self.model.as_str(), self.params.as_slice()) {
            ("SIMPLE_PINHOLE", &[f, cx, cy]) => Some(pinhole_matrix(f, cx, cy)),
            ("PINHOLE", &[fx, fy, cx, cy]) => Some(na::Matrix3::new(
                fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0,
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    pub id: u32,
    pub camera_id: u32,
    pub name: String,
    pub pose: WorldToCamera,
}

struct LineParser<'a> {
    file: &'a str,
    line: usize,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> LineParser<'a> {
    fn new(file: &'a str, line: usize, text: &'a str) -> LineParser<'a> {
        LineParser {
            file,
            line,
            tokens: text.split_whitespace(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> EngineError {
        EngineError::MalformedOutput {
            file: self.file.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, EngineError> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| self.error(format!("missing {}", what)))?;
        token
            .parse()
            .map_err(|_| self.error(format!("bad {} `{}`", what, token)))
    }

    fn rest<T: FromStr>(&mut self, what: &str) -> Result<Vec<T>, EngineError> {
        let mut values = Vec::new();
        while let Some(token) = self.tokens.next() {
            values.push(
                token
                    .parse()
                    .map_err(|_| self.error(format!("bad {} `{}`", what, token)))?,
            );
        }
        Ok(values)
    }
}

/// Lines that are not comments, numbered from 1. Empty lines are kept since
/// `images.txt` uses them for images without 2D points.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim_start().starts_with('#'))
}

pub fn parse_cameras(file: &str, text: &str) -> Result<BTreeMap<u32, ColmapCamera>, EngineError> {
    let mut cameras = BTreeMap::new();
    for (line, content) in content_lines(text) {
        if content.trim().is_empty() {
            continue;
        }
        let mut p = LineParser::new(file, line, content);
        let camera = ColmapCamera {
            id: p.next("camera id")?,
            model: p.next("camera model")?,
            width: p.next("width")?,
            height: p.next("height")?,
            params: p.rest("camera parameter")?,
        };
        cameras.insert(camera.id, camera);
    }
    Ok(cameras)
}

/// Parses `images.txt`: a header line per image followed by its 2D points line.
pub fn parse_images(file: &str, text: &str) -> Result<Vec<ColmapImage>, EngineError> {
    let lines: Vec<_> = content_lines(text).collect();
    let mut images = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (line, content) = lines[i];
        if content.trim().is_empty() {
            i += 1;
            continue;
        }
        let mut p = LineParser::new(file, line, content);
        let id = p.next("image id")?;
        let qw: f64 = p.next("qw")?;
        let qx: f64 = p.next("qx")?;
        let qy: f64 = p.next("qy")?;
        let qz: f64 = p.next("qz")?;
        let tx: f64 = p.next("tx")?;
        let ty: f64 = p.next("ty")?;
        let tz: f64 = p.next("tz")?;
        let camera_id = p.next("camera id")?;
        let name: String = p.next("image name")?;
        images.push(ColmapImage {
            id,
            camera_id,
            name,
            pose: WorldToCamera::from_quaternion(
                na::Quaternion::new(qw, qx, qy, qz),
                na::Vector3::new(tx, ty, tz),
            ),
        });
        // skip the POINTS2D line
        i += 2;
    }
    Ok(images)
}

pub fn parse_points3d(file: &str, text: &str) -> Result<Vec<na::Point3<f64>>, EngineError> {
    let mut points = Vec::new();
    for (line, content) in content_lines(text) {
        if content.trim().is_empty() {
            continue;
        }
        let mut p = LineParser::new(file, line, content);
        let _id: u64 = p.next("point id")?;
        let x = p.next("x")?;
        let y = p.next("y")?;
        let z = p.next("z")?;
        points.push(na::Point3::new(x, y, z));
    }
    Ok(points)
}

fn read_model_file(dir: &Path, name: &str) -> Result<String, EngineError> {
    let path = dir.join(name);
    std::fs::read_to_string(&path).map_err(|e| EngineError::Invocation {
        command: "model_converter".to_string(),
        detail: format!("cannot read {}: {}", path.display(), e),
    })
}

/// Reads a text model and maps image names back to image indices.
///
/// Images with an unknown name or a camera model without a plain pinhole
/// matrix are left out of the reconstruction.
pub fn read_text_model(
    dir: &Path,
    name_to_index: &HashMap<String, usize>,
) -> Result<Reconstruction, EngineError> {
    let cameras = parse_cameras("cameras.txt", &read_model_file(dir, "cameras.txt")?)?;
    let images = parse_images("images.txt", &read_model_file(dir, "images.txt")?)?;
    let points3d = parse_points3d("points3D.txt", &read_model_file(dir, "points3D.txt")?)?;

    let mut views = BTreeMap::new();
    for image in images {
        let Some(&idx) = name_to_index.get(&image.name) else {
            warn!("reconstruction contains unknown image {}", image.name);
            continue;
        };
        let Some(intrinsics) = cameras.get(&image.camera_id).and_then(ColmapCamera::intrinsics)
        else {
            warn!(
                "image {} uses an unsupported camera {}, skipping",
                image.name, image.camera_id
            );
            continue;
        };
        views.insert(
            idx,
            RegisteredView {
                intrinsics,
                pose: image.pose,
            },
        );
    }
    Ok(Reconstruction { views, points3d })
}
