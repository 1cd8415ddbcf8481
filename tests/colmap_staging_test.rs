use std::fs;
use std::path::Path;

use locator_calibration::config::ColmapOptions;
use locator_calibration::correspondence::CorrespondenceStore;
use locator_calibration::engine::adapter::prepare_input;
use locator_calibration::engine::colmap::{ColmapEngine, model_dirs, stage_inputs, staged_name};
use locator_calibration::engine::colmap_model::read_text_model;
use locator_calibration::engine::{EngineError, EngineInput, ReconstructionEngine};
use locator_calibration::graph::CorrespondenceGraph;
use locator_calibration::{ImageRecord, Locator};

fn engine_input(dir: &Path) -> EngineInput {
    let images: Vec<_> = ["left.png", "right.png", "wide.png"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let path = dir.join(name);
            fs::write(&path, b"not really a png").unwrap();
            let width = if i == 2 { 800 } else { 640 };
            ImageRecord::new(path, width, 480)
        })
        .collect();
    let locators = vec![
        Locator::new("a").with_position(0, 0.5, 0.5).with_position(1, 0.25, 0.5),
        Locator::new("b").with_position(0, 0.1, 0.2).with_position(2, 0.3, 0.4),
        Locator::new("c").with_position(1, 0.6, 0.6),
    ];
    let store = CorrespondenceStore::from_locators(&locators, images.len()).unwrap();
    let graph = CorrespondenceGraph::build(&images, &store);
    prepare_input(&images, &graph)
}

#[test]
fn test_staged_name_is_unique() {
    assert_eq!(staged_name(3, Path::new("/data/a/img.png")), "0003_img.png");
    assert_ne!(
        staged_name(0, Path::new("/x/img.png")),
        staged_name(1, Path::new("/y/img.png"))
    );
}

#[test]
fn test_stage_inputs_layout() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let input = engine_input(src.path());
    let staged = stage_inputs(work.path(), &input).unwrap();

    assert!(staged.image_dir.join("0000_left.png").exists());
    assert!(staged.image_dir.join("0002_wide.png").exists());
    assert_eq!(staged.name_to_index["0001_right.png"], 1);

    let features = fs::read_to_string(staged.feature_dir.join("0000_left.png.txt")).unwrap();
    let mut lines = features.lines();
    assert_eq!(lines.next(), Some("2 128"));
    let first: Vec<&str> = lines.next().unwrap().split_whitespace().collect();
    assert_eq!(first.len(), 4 + 128);
    assert_eq!(&first[..4], &["320", "240", "1", "0"]);

    // two seed cameras: 640x480 and 800x480
    assert_eq!(staged.camera_groups.len(), 2);
    let params: Vec<_> = staged.camera_groups.iter().map(|(_, p)| p.as_str()).collect();
    assert!(params.contains(&"768,320,240"));
    assert!(params.contains(&"960,400,240"));
    for (list, params) in &staged.camera_groups {
        let members = fs::read_to_string(list).unwrap();
        if params == "960,400,240" {
            assert_eq!(members.trim(), "0002_wide.png");
        } else {
            assert_eq!(members.lines().count(), 2);
        }
    }

    let matches = fs::read_to_string(&staged.match_list).unwrap();
    assert_eq!(
        matches,
        "0000_left.png 0001_right.png\n0 0\n\n0000_left.png 0002_wide.png\n1 0\n\n"
    );
}

#[test]
fn test_missing_executable_is_invocation_failure() {
    let src = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let work_root = root.path().join("runs");
    let engine = ColmapEngine::new(ColmapOptions {
        executable: root.path().join("no-such-colmap"),
        work_root: Some(work_root.clone()),
        ..Default::default()
    });
    let input = engine_input(src.path());

    let err = engine.reconstruct(&input).unwrap_err();
    assert!(matches!(err, EngineError::Invocation { .. }));
    // the per-run workspace is removed
    assert_eq!(fs::read_dir(&work_root).unwrap().count(), 0);
}

#[test]
fn test_missing_image_is_staging_failure() {
    let work = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    let mut input = engine_input(src.path());
    input.images[1].path = src.path().join("gone.png");
    let err = stage_inputs(work.path(), &input).unwrap_err();
    assert!(matches!(err, EngineError::Staging { .. }));

    let calib_err: locator_calibration::CalibrationError = err.into();
    assert_eq!(
        calib_err.kind(),
        locator_calibration::FailureKind::DataIOFailed
    );
}

#[test]
fn test_options_from_json_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("colmap.json");
    fs::write(&path, r#"{ "executable": "/opt/colmap/bin/colmap", "min_num_matches": 5 }"#)
        .unwrap();
    let options = ColmapOptions::from_json_file(&path).unwrap();
    assert_eq!(options.min_num_matches, 5);
    assert_eq!(options.abs_pose_max_error, 24.0);
    assert!(options.work_root.is_none());
}

#[test]
fn test_staged_names_have_no_whitespace() {
    assert_eq!(staged_name(0, Path::new("/shots/IMG 001.png")), "0000_IMG_001.png");
    assert_eq!(staged_name(12, Path::new("a\tb c.jpg")), "0012_a_b_c.jpg");
}

#[test]
fn test_file_names_with_spaces_survive_the_model() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let images: Vec<_> = ["IMG 001.png", "IMG 002.png"]
        .iter()
        .map(|name| {
            let path = src.path().join(name);
            fs::write(&path, b"png").unwrap();
            ImageRecord::new(path, 640, 480)
        })
        .collect();
    let locators = vec![
        Locator::new("a").with_position(0, 0.5, 0.5).with_position(1, 0.4, 0.5),
        Locator::new("b").with_position(0, 0.2, 0.3).with_position(1, 0.1, 0.3),
    ];
    let store = CorrespondenceStore::from_locators(&locators, images.len()).unwrap();
    let input = prepare_input(&images, &CorrespondenceGraph::build(&images, &store));
    let staged = stage_inputs(work.path(), &input).unwrap();

    let matches = fs::read_to_string(&staged.match_list).unwrap();
    let header: Vec<&str> = matches.lines().next().unwrap().split_whitespace().collect();
    assert_eq!(header, vec!["0000_IMG_001.png", "0001_IMG_002.png"]);

    // the mapper writes the staged names back into images.txt
    let model = work.path().join("model");
    fs::create_dir(&model).unwrap();
    fs::write(model.join("cameras.txt"), "1 SIMPLE_PINHOLE 640 480 768 320 240\n").unwrap();
    let images_txt: String = header
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{} 1 0 0 0 {} 0 0 1 {}\n\n", i + 1, i, name))
        .collect();
    fs::write(model.join("images.txt"), images_txt).unwrap();
    fs::write(model.join("points3D.txt"), "").unwrap();

    let rec = read_text_model(&model, &staged.name_to_index).unwrap();
    assert_eq!(rec.views.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_model_dirs_under_glob_metacharacters() {
    let root = tempfile::tempdir().unwrap();
    let sparse = root.path().join("runs[1]*?").join("sparse");
    for dir in ["1", "0", "10", "0.txt", "notes"] {
        fs::create_dir_all(sparse.join(dir)).unwrap();
    }
    fs::write(sparse.join("2"), b"a file, not a model").unwrap();

    let dirs = model_dirs(&sparse).unwrap();
    let names: Vec<_> = dirs
        .iter()
        .map(|d| d.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["0", "1", "10"]);
}
