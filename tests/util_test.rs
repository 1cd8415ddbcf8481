use locator_calibration::util::{finite_mean, finite_median, finite_or_none};

#[test]
fn test_finite_mean_skips_infinite() {
    assert_eq!(finite_mean(&[1.0, f64::INFINITY, 3.0]), Some(2.0));
    assert_eq!(finite_mean(&[f64::INFINITY, f64::NAN]), None);
    assert_eq!(finite_mean(&[]), None);
}

#[test]
fn test_finite_median() {
    assert_eq!(finite_median(&[5.0, 1.0, 3.0]), Some(3.0));
    assert_eq!(finite_median(&[4.0, 1.0, f64::INFINITY, 2.0, 3.0]), Some(2.5));
    assert_eq!(finite_median(&[f64::INFINITY]), None);
}

#[test]
fn test_finite_or_none() {
    assert_eq!(finite_or_none(0.5), Some(0.5));
    assert_eq!(finite_or_none(f64::INFINITY), None);
    assert_eq!(finite_or_none(f64::NAN), None);
}
