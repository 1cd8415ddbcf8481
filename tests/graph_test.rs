use locator_calibration::correspondence::CorrespondenceStore;
use locator_calibration::graph::CorrespondenceGraph;
use locator_calibration::{ImageRecord, Locator, LocatorId};

fn images() -> Vec<ImageRecord> {
    vec![
        ImageRecord::new("a.png", 100, 50),
        ImageRecord::new("b.png", 200, 100),
        ImageRecord::new("c.png", 100, 100),
    ]
}

fn locators() -> Vec<Locator> {
    vec![
        Locator::new("door")
            .with_position(0, 0.5, 0.5)
            .with_position(1, 0.25, 0.75),
        Locator::new("window")
            .with_position(1, 0.1, 0.2)
            .with_position(2, 0.3, 0.4),
        Locator::new("lamp")
            .with_position(0, 0.0, 1.0)
            .with_position(1, 1.0, 0.0)
            .with_position(2, 0.5, 0.5),
        Locator::new("single").with_position(2, 0.9, 0.9),
    ]
}

#[test]
fn test_keypoints_are_pixels() {
    let store = CorrespondenceStore::from_locators(&locators(), 3).unwrap();
    let graph = CorrespondenceGraph::build(&images(), &store);

    assert_eq!(graph.keypoints.len(), 3);
    assert_eq!(graph.keypoints[0].len(), 2);
    assert_eq!(graph.keypoints[1].len(), 3);
    assert_eq!(graph.keypoints[2].len(), 3);

    let door_in_b = graph.keypoint_map[&1][&LocatorId(0)];
    let kp = graph.keypoints[1][door_in_b];
    assert_eq!((kp.x, kp.y), (50.0, 75.0));
    assert_eq!((kp.scale, kp.orientation), (1.0, 0.0));
}

#[test]
fn test_keypoint_indices_follow_locator_order() {
    let store = CorrespondenceStore::from_locators(&locators(), 3).unwrap();
    let graph = CorrespondenceGraph::build(&images(), &store);
    let in_c = &graph.keypoint_map[&2];
    assert_eq!(in_c[&LocatorId(1)], 0);
    assert_eq!(in_c[&LocatorId(2)], 1);
    assert_eq!(in_c[&LocatorId(3)], 2);
}

#[test]
fn test_matches_per_pair() {
    let store = CorrespondenceStore::from_locators(&locators(), 3).unwrap();
    let graph = CorrespondenceGraph::build(&images(), &store);

    let pairs: Vec<_> = graph
        .matches
        .iter()
        .map(|m| (m.image_a, m.image_b, m.matches.len()))
        .collect();
    assert_eq!(pairs, vec![(0, 1, 2), (0, 2, 1), (1, 2, 2)]);
    assert_eq!(graph.match_count(), 5);

    // the single-view locator has a keypoint but no match
    let single_kp = graph.keypoint_map[&2][&LocatorId(3)];
    assert!(graph
        .matches
        .iter()
        .filter(|m| m.image_b == 2)
        .all(|m| m.matches.iter().all(|&(_, b)| b != single_kp)));
}

#[test]
fn test_build_is_deterministic() {
    let store = CorrespondenceStore::from_locators(&locators(), 3).unwrap();
    let a = CorrespondenceGraph::build(&images(), &store);
    let b = CorrespondenceGraph::build(&images(), &store);
    assert_eq!(a, b);
}

#[test]
fn test_image_without_observations_has_empty_entry() {
    let mut imgs = images();
    imgs.push(ImageRecord::new("d.png", 10, 10));
    let store = CorrespondenceStore::from_locators(&locators(), 4).unwrap();
    let graph = CorrespondenceGraph::build(&imgs, &store);
    assert!(graph.keypoint_map[&3].is_empty());
    assert!(graph.keypoints[3].is_empty());
    assert!(graph.matches.iter().all(|m| m.image_b != 3));
}

#[test]
fn test_store_rejects_duplicate_names() {
    let locs = vec![
        Locator::new("x").with_position(0, 0.1, 0.1),
        Locator::new("x").with_position(1, 0.1, 0.1),
    ];
    assert!(CorrespondenceStore::from_locators(&locs, 2).is_err());
}

#[test]
fn test_store_rejects_nan() {
    let locs = vec![Locator::new("x").with_position(0, f64::NAN, 0.1)];
    assert!(CorrespondenceStore::from_locators(&locs, 1).is_err());
}
