use criterion::{Criterion, black_box, criterion_group, criterion_main};
use locator_calibration::correspondence::CorrespondenceStore;
use locator_calibration::engine::adapter::extract_result;
use locator_calibration::engine::{Reconstruction, RegisteredView};
use locator_calibration::reprojection::ErrorAnalysis;
use locator_calibration::synthetic::{SceneConfig, SyntheticScene, project};
use locator_calibration::triangulation::triangulate_dlt;
use nalgebra as na;

fn scene() -> SyntheticScene {
    SyntheticScene::generate(&SceneConfig {
        num_cameras: 8,
        num_locators: 200,
        extent: 0.5,
        pixel_noise: 0.5,
        ..Default::default()
    })
}

fn bench_triangulate(c: &mut Criterion) {
    let scene = scene();
    let point = na::Point3::new(0.1, -0.2, 0.3);
    let views: Vec<_> = scene
        .poses
        .iter()
        .filter_map(|pose| {
            let uv = project(&scene.intrinsics, pose, &point)?;
            Some((pose.projection_matrix(&scene.intrinsics), uv))
        })
        .collect();

    c.bench_function("triangulate_dlt_8_views", |b| {
        b.iter(|| triangulate_dlt(black_box(&views)))
    });
}

fn bench_error_passes(c: &mut Criterion) {
    let scene = scene();
    let views = scene
        .poses
        .iter()
        .enumerate()
        .map(|(idx, pose)| {
            (
                idx,
                RegisteredView {
                    intrinsics: scene.intrinsics,
                    pose: *pose,
                },
            )
        })
        .collect();
    let result = extract_result(
        Reconstruction {
            views,
            points3d: Vec::new(),
        },
        scene.images.len(),
    );
    let store = CorrespondenceStore::from_locators(&scene.locators, scene.images.len()).unwrap();
    let analysis = ErrorAnalysis::new(&result, &scene.images, &store);

    c.bench_function("locator_errors_200", |b| b.iter(|| analysis.locator_errors()));
    c.bench_function("image_errors_200", |b| b.iter(|| analysis.image_errors()));
}

criterion_group!(benches, bench_triangulate, bench_error_passes);
criterion_main!(benches);
