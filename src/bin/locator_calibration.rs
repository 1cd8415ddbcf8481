use clap::Parser;
use locator_calibration::config::ColmapOptions;
use locator_calibration::engine::colmap::ColmapEngine;
use locator_calibration::io::{CalibrationJob, write_detailed_report, write_report};
use locator_calibration::{CalibrationSession, Calibrator};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct LcalCli {
    /// job json with images and locators
    job: PathBuf,

    /// colmap options json
    #[arg(long)]
    config: Option<PathBuf>,

    /// colmap executable, overrides the config
    #[arg(long)]
    colmap: Option<PathBuf>,

    /// parent directory of the colmap workspace
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// output folder
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// also write a plain text summary
    #[arg(long, action)]
    summary: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = LcalCli::parse();

    let mut options = match &cli.config {
        Some(path) => ColmapOptions::from_json_file(path)?,
        None => ColmapOptions::default(),
    };
    if let Some(exe) = cli.colmap {
        options.executable = exe;
    }
    if let Some(dir) = cli.work_dir {
        options.work_root = Some(dir);
    }

    let job = CalibrationJob::load_json(&cli.job)?;
    let base_dir = cli.job.parent().unwrap_or(Path::new("."));
    let images = job.resolve_images(base_dir)?;

    let calibrator = Calibrator::new(ColmapEngine::new(options));
    let mut session = CalibrationSession::new();
    calibrator.load(&mut session, images, job.locators)?;

    let now = Instant::now();
    let result = calibrator.calibrate(&mut session)?;
    info!(
        "calibration took {:.3} sec, {} images registered",
        now.elapsed().as_secs_f64(),
        result.registered_image_indices.len()
    );

    std::fs::create_dir_all(&cli.output)?;
    let report = write_detailed_report(cli.output.join("calibration.json"), &session)?;
    if cli.summary {
        write_report(cli.output.join("summary.txt"), &session)?;
    }
    match report.mean_locator_error_px {
        Some(e) => println!("mean locator error: {:.4} px", e),
        None => println!("mean locator error: inf"),
    }
    if !report.unresolved_locators.is_empty() {
        println!("unresolved: {}", report.unresolved_locators.join(", "));
    }
    Ok(())
}
