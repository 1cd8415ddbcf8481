//! [`ReconstructionEngine`] backed by the `colmap` command-line tool.
//!
//! Every call stages a fresh workspace:
//!
//! ```text
//! <work>/images/0000_<file name>      copied input images
//! <work>/features/<staged name>.txt   keypoints with zero descriptors
//! <work>/lists/camera_<n>.txt         images sharing one seed camera
//! <work>/matches.txt                  verified matches, inlier format
//! <work>/database.db
//! <work>/sparse/<k>/                  mapper output, one per model
//! ```
//!
//! The workspace is a [`tempfile::TempDir`] and disappears when the call
//! returns, whatever the outcome.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use glob::glob;
use log::{debug, info, warn};

use super::colmap_model::read_text_model;
use super::{EngineError, EngineInput, Reconstruction, ReconstructionEngine};
use crate::config::ColmapOptions;

const DESCRIPTOR_DIM: usize = 128;

/// Files written for one engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInputs {
    pub image_dir: PathBuf,
    pub feature_dir: PathBuf,
    pub match_list: PathBuf,
    /// One image list per distinct seed camera, with the seed params `f,cx,cy`.
    pub camera_groups: Vec<(PathBuf, String)>,
    pub name_to_index: HashMap<String, usize>,
}

fn staging_error(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError + '_ {
    move |source| EngineError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), EngineError> {
    fs::write(path, contents).map_err(staging_error(path))
}

fn create_dir(path: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(path).map_err(staging_error(path))
}

/// Name of image `index` inside the workspace. The index prefix keeps names
/// unique when two inputs share a file name. Whitespace becomes `_` since
/// COLMAP's match list and text models split on it.
pub fn staged_name(index: usize, path: &Path) -> String {
    let file_name: String = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{:04}_{}", index, file_name)
}

/// Copies images and writes feature files, camera lists and the match list.
pub fn stage_inputs(work_dir: &Path, input: &EngineInput) -> Result<StagedInputs, EngineError> {
    let image_dir = work_dir.join("images");
    let feature_dir = work_dir.join("features");
    let list_dir = work_dir.join("lists");
    for dir in [&image_dir, &feature_dir, &list_dir] {
        create_dir(dir)?;
    }

    let names: Vec<String> = input
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| staged_name(idx, &image.path))
        .collect();

    let zeros = vec!["0"; DESCRIPTOR_DIM].join(" ");
    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (image, name) in input.images.iter().zip(&names) {
        let dst = image_dir.join(name);
        fs::copy(&image.path, &dst).map_err(staging_error(&image.path))?;

        let mut features = format!("{} {}\n", image.keypoints.len(), DESCRIPTOR_DIM);
        for kp in &image.keypoints {
            features += format!(
                "{} {} {} {} {}\n",
                kp.x, kp.y, kp.scale, kp.orientation, zeros
            )
            .as_str();
        }
        write_file(&feature_dir.join(format!("{}.txt", name)), &features)?;

        let params = format!("{},{},{}", image.camera.focal, image.camera.cx, image.camera.cy);
        groups.entry(params).or_default().push(name);
    }

    let mut camera_groups = Vec::new();
    for (n, (params, members)) in groups.into_iter().enumerate() {
        let list = list_dir.join(format!("camera_{}.txt", n));
        write_file(&list, &(members.join("\n") + "\n"))?;
        camera_groups.push((list, params));
    }

    let mut match_text = String::new();
    for pair in &input.matches {
        let (Some(a), Some(b)) = (names.get(pair.image_a), names.get(pair.image_b)) else {
            continue;
        };
        match_text += format!("{} {}\n", a, b).as_str();
        for (kp_a, kp_b) in &pair.matches {
            match_text += format!("{} {}\n", kp_a, kp_b).as_str();
        }
        match_text.push('\n');
    }
    let match_list = work_dir.join("matches.txt");
    write_file(&match_list, &match_text)?;

    let name_to_index = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();
    Ok(StagedInputs {
        image_dir,
        feature_dir,
        match_list,
        camera_groups,
        name_to_index,
    })
}

/// Model directories written by the mapper (`sparse/0`, `sparse/1`, ...),
/// in numeric order.
pub fn model_dirs(sparse: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let listing_error = |detail: String| EngineError::Invocation {
        command: "colmap mapper".to_string(),
        detail,
    };
    let base = sparse
        .to_str()
        .ok_or_else(|| listing_error(format!("non UTF-8 model path {}", sparse.display())))?;
    let pattern = format!("{}/*", glob::Pattern::escape(base));
    let paths = glob(&pattern).map_err(|e| listing_error(format!("bad model pattern: {}", e)))?;

    let mut dirs: Vec<(usize, PathBuf)> = Vec::new();
    for entry in paths {
        let p = entry.map_err(|e| listing_error(format!("cannot list models: {}", e)))?;
        if !p.is_dir() {
            continue;
        }
        let Some(id) = p
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse().ok())
        else {
            continue;
        };
        dirs.push((id, p));
    }
    dirs.sort();
    Ok(dirs.into_iter().map(|(_, p)| p).collect())
}

pub struct ColmapEngine {
    options: ColmapOptions,
}

impl ColmapEngine {
    pub fn new(options: ColmapOptions) -> ColmapEngine {
        ColmapEngine { options }
    }

    pub fn options(&self) -> &ColmapOptions {
        &self.options
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.options.executable);
        cmd.arg(subcommand);
        cmd
    }

    fn execute(&self, subcommand: &str, mut cmd: Command) -> Result<(), EngineError> {
        debug!("running {:?}", cmd);
        let command = format!("colmap {}", subcommand);
        let output = cmd.output().map_err(|e| EngineError::Invocation {
            command: command.clone(),
            detail: e.to_string(),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Invocation {
                command,
                detail: format!("{} ({})", stderr.trim(), output.status),
            });
        }
        Ok(())
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir, EngineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("colmap-work-");
        match &self.options.work_root {
            Some(root) => {
                create_dir(root)?;
                builder.tempdir_in(root).map_err(staging_error(root))
            }
            None => builder
                .tempdir()
                .map_err(staging_error(&std::env::temp_dir())),
        }
    }

    fn import(&self, work_dir: &Path, staged: &StagedInputs) -> Result<PathBuf, EngineError> {
        let database = work_dir.join("database.db");

        let mut cmd = self.command("database_creator");
        cmd.arg("--database_path").arg(&database);
        self.execute("database_creator", cmd)?;

        for (list, params) in &staged.camera_groups {
            let mut cmd = self.command("feature_importer");
            cmd.arg("--database_path")
                .arg(&database)
                .arg("--image_path")
                .arg(&staged.image_dir)
                .arg("--import_path")
                .arg(&staged.feature_dir)
                .arg("--image_list_path")
                .arg(list)
                .args(["--ImageReader.camera_model", "SIMPLE_PINHOLE"])
                .args(["--ImageReader.single_camera", "0"])
                .arg("--ImageReader.camera_params")
                .arg(params);
            self.execute("feature_importer", cmd)?;
        }

        let mut cmd = self.command("matches_importer");
        cmd.arg("--database_path")
            .arg(&database)
            .arg("--match_list_path")
            .arg(&staged.match_list)
            .args(["--match_type", "inliers"]);
        self.execute("matches_importer", cmd)?;
        Ok(database)
    }

    fn map(&self, work_dir: &Path, database: &Path, image_dir: &Path) -> Result<PathBuf, EngineError> {
        let sparse = work_dir.join("sparse");
        create_dir(&sparse)?;
        let o = &self.options;
        let mut cmd = self.command("mapper");
        cmd.arg("--database_path")
            .arg(database)
            .arg("--image_path")
            .arg(image_dir)
            .arg("--output_path")
            .arg(&sparse)
            .arg("--Mapper.min_num_matches")
            .arg(o.min_num_matches.to_string())
            .arg("--Mapper.init_min_num_inliers")
            .arg(o.init_min_num_inliers.to_string())
            .arg("--Mapper.init_min_tri_angle")
            .arg(o.init_min_tri_angle.to_string())
            .arg("--Mapper.abs_pose_min_num_inliers")
            .arg(o.abs_pose_min_num_inliers.to_string())
            .arg("--Mapper.abs_pose_max_error")
            .arg(o.abs_pose_max_error.to_string())
            .arg("--Mapper.filter_min_tri_angle")
            .arg(o.filter_min_tri_angle.to_string());
        self.execute("mapper", cmd)?;
        Ok(sparse)
    }

    fn read_model(&self, model_dir: &Path, staged: &StagedInputs) -> Result<Reconstruction, EngineError> {
        let text_dir = model_dir.with_extension("txt");
        create_dir(&text_dir)?;
        let mut cmd = self.command("model_converter");
        cmd.arg("--input_path")
            .arg(model_dir)
            .arg("--output_path")
            .arg(&text_dir)
            .args(["--output_type", "TXT"]);
        self.execute("model_converter", cmd)?;
        read_text_model(&text_dir, &staged.name_to_index)
    }
}

impl ReconstructionEngine for ColmapEngine {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError> {
        let workspace = self.create_workspace()?;
        let work_dir = workspace.path();
        info!("staging colmap workspace in {}", work_dir.display());

        let staged = stage_inputs(work_dir, input)?;
        let database = self.import(work_dir, &staged)?;
        let sparse = self.map(work_dir, &database, &staged.image_dir)?;

        let mut reconstructions = Vec::new();
        for model_dir in model_dirs(&sparse)? {
            let rec = self.read_model(&model_dir, &staged)?;
            debug!(
                "model {} registered {} images",
                model_dir.display(),
                rec.num_registered()
            );
            reconstructions.push(rec);
        }
        if reconstructions.is_empty() {
            warn!("mapper produced no model");
        }
        Ok(reconstructions)
    }
}
