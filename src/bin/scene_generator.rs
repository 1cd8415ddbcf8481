use clap::{Parser, Subcommand};
use locator_calibration::io::{CalibrationJob, JobImage, object_to_json};
use locator_calibration::synthetic::{SceneConfig, SyntheticScene};
use std::path::Path;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic calibration job
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of cameras
        #[arg(short = 'n', long, default_value = "4")]
        num_cameras: usize,

        /// Number of locators
        #[arg(short, long, default_value = "12")]
        locators: usize,

        /// Image width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "480")]
        height: u32,

        /// Observation noise in pixels
        #[arg(long, default_value = "0.0")]
        noise: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Generate {
            output,
            num_cameras,
            locators,
            width,
            height,
            noise,
            seed,
        } => {
            let config = SceneConfig {
                num_cameras,
                num_locators: locators,
                width,
                height,
                pixel_noise: noise,
                seed,
                ..Default::default()
            };
            generate_job(&output, &config)?;
        }
    }

    Ok(())
}

fn generate_job(output_dir: &str, config: &SceneConfig) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let scene = SyntheticScene::generate(config);

    let mut images = Vec::new();
    for img in &scene.images {
        image::RgbImage::new(img.width, img.height).save(Path::new(output_dir).join(&img.path))?;
        images.push(JobImage {
            path: img.path.clone(),
            width: Some(img.width),
            height: Some(img.height),
        });
    }

    let job = CalibrationJob {
        images,
        locators: scene.locators,
    };
    job.write_json(Path::new(output_dir).join("job.json"))?;

    let truth: Vec<_> = scene
        .poses
        .iter()
        .map(|p| (p.rotation, p.translation))
        .collect();
    object_to_json(Path::new(output_dir).join("ground_truth.json"), &truth)?;
    object_to_json(Path::new(output_dir).join("scene.json"), config)?;

    println!(
        "Generated {} images and {} locators in {}",
        job.images.len(),
        job.locators.len(),
        output_dir
    );
    Ok(())
}
