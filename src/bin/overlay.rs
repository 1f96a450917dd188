use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use marker_overlay::calibration::Calibration;
use marker_overlay::config::OverlayConfig;
use marker_overlay::detector::{AprilTagDetector, MarkerDetector};
use marker_overlay::io::{object_from_json, object_to_json, write_session_report};
use marker_overlay::pipeline::{OverlayPipeline, Projector, RunSummary, StopFlag};
use marker_overlay::preview::PreviewProcess;
use marker_overlay::render::{FrameBuffer, PngSink, RenderSink};
use marker_overlay::replay::{PoseLog, replay};
use marker_overlay::simulation::{GroundTruthDetector, SyntheticConfig, SyntheticPoseSource};
use marker_overlay::source::{FrameSource, ImageFolderSource};
use marker_overlay::visualization::{RerunSink, log_markers};

#[derive(Parser)]
#[command(version, about, author)]
struct OverlayCli {
    /// deployment config json, built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// write every display frame as png into this folder
    #[arg(long)]
    png_dir: Option<PathBuf>,

    /// save a rerun recording (.rrd)
    #[arg(long)]
    rerun: Option<PathBuf>,

    /// stop after this many frames
    #[arg(long)]
    max_frames: Option<usize>,

    /// write a json session report here when the loop ends
    #[arg(long)]
    report: Option<PathBuf>,

    /// launch the observer camera preview process
    #[arg(long)]
    preview: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the overlay on a folder of captured frames
    Run {
        /// path to image folder
        images: PathBuf,

        #[arg(long, default_value = "0")]
        start_idx: usize,

        #[arg(long, default_value = "1")]
        step: usize,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run the overlay on a seeded synthetic marker trajectory
    Simulate {
        #[arg(long, default_value = "0")]
        seed: u64,

        #[arg(long, default_value = "300")]
        frames: usize,

        #[arg(long, default_value = "1")]
        markers: u32,

        #[arg(long, default_value = "0.0")]
        drop_rate: f64,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Project a recorded pose log offline
    Replay {
        /// pose log json
        poses: PathBuf,

        #[arg(short, long, default_value = "replay.json")]
        output: PathBuf,
    },
    /// Write the default config
    InitConfig {
        #[arg(default_value = "overlay.json")]
        output: PathBuf,
    },
    /// Validate config and calibration without starting the loop
    Check,
}

fn load_config(path: Option<&Path>) -> Result<OverlayConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => OverlayConfig::load(p)?,
        None => {
            let c = OverlayConfig::default();
            c.validate()?;
            c
        }
    };
    Ok(config)
}

/// Raise `stop` when the operator types `q`.
fn spawn_quit_listener(stop: StopFlag) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                    log::info!("quit requested");
                    stop.request_stop();
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });
}

fn build_sinks(
    config: &OverlayConfig,
    output: &OutputArgs,
) -> Result<(Vec<Box<dyn RenderSink>>, Option<rerun::RecordingStream>), Box<dyn std::error::Error>> {
    let resolution = config.resolution();
    let dot_radius = config.display.dot_radius;
    let mut sinks: Vec<Box<dyn RenderSink>> = Vec::new();
    if let Some(dir) = &output.png_dir {
        sinks.push(Box::new(PngSink::new(dir, resolution, dot_radius)?));
    }
    let recording = match &output.rerun {
        Some(path) => {
            let rec = rerun::RecordingStreamBuilder::new("marker_overlay").save(path)?;
            sinks.push(Box::new(RerunSink::new(rec.clone(), resolution, dot_radius)));
            Some(rec)
        }
        None => None,
    };
    if sinks.is_empty() {
        log::info!("no display output selected, rendering into memory only");
        sinks.push(Box::new(FrameBuffer::new(resolution, dot_radius)));
    }
    Ok((sinks, recording))
}

fn run_session<S, D>(
    config: &OverlayConfig,
    source: S,
    detector: D,
    output: &OutputArgs,
) -> Result<RunSummary, Box<dyn std::error::Error>>
where
    S: FrameSource,
    D: MarkerDetector<S::Frame>,
{
    let projector = Projector::from_config(config)?;
    let (sinks, recording) = build_sinks(config, output)?;

    let mut pipeline = OverlayPipeline::new(projector, source, detector, sinks)
        .with_brightness(config.display.brightness);
    if let Some(max) = output.max_frames {
        pipeline = pipeline.with_max_frames(max);
    }
    if let Some(rec) = recording {
        pipeline = pipeline.with_frame_hook(move |idx, observations, _| {
            if let Err(e) = log_markers(&rec, idx as i64, observations) {
                log::warn!("{}", e);
            }
        });
    }
    if output.preview || config.preview.enabled {
        let p = &config.preview;
        match PreviewProcess::start(&p.command, p.poll_interval(), p.grace_period()) {
            Ok(preview) => pipeline = pipeline.with_preview(preview),
            Err(e) => log::error!("observer preview unavailable: {}", e),
        }
    }

    let stop = StopFlag::new();
    spawn_quit_listener(stop.clone());
    log::info!("type 'q' and enter to quit");

    let now = Instant::now();
    let summary = pipeline.run(&stop)?;
    let duration_sec = now.elapsed().as_secs_f64();
    log::info!(
        "{} frames in {:.3} sec, {} hits, {} misses",
        summary.frames,
        duration_sec,
        summary.hits,
        summary.misses()
    );
    if let Some(path) = &output.report {
        write_session_report(path, &summary)?;
    }
    Ok(summary)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = OverlayCli::parse();

    match cli.command {
        Commands::Run {
            images,
            start_idx,
            step,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let calibration = Calibration::load(&config.calibration_path)?;
            let source =
                ImageFolderSource::with_stride(&images, config.rotate_capture_180, start_idx, step)?;
            let detector = AprilTagDetector::new(calibration, config.marker_length);
            run_session(&config, source, detector, &output)?;
        }
        Commands::Simulate {
            seed,
            frames,
            markers,
            drop_rate,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let synthetic = SyntheticConfig {
                seed,
                frames,
                markers,
                drop_rate,
                ..Default::default()
            };
            let source = SyntheticPoseSource::new(synthetic, config.observer_from_forward.tvec[0]);
            run_session(&config, source, GroundTruthDetector, &output)?;
        }
        Commands::Replay { poses, output } => {
            let config = load_config(cli.config.as_deref())?;
            let projector = Projector::from_config(&config)?;
            let log: PoseLog = object_from_json(&poses)?;
            let result = replay(&projector, &log, true);
            object_to_json(&output, &result)?;
            println!("hit rate {:.3}, written to {}", result.summary.hit_rate(), output.display());
        }
        Commands::InitConfig { output } => {
            object_to_json(&output, &OverlayConfig::default())?;
            println!("default config written to {}", output.display());
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            let plane = config.display_plane()?;
            let calibration = Calibration::load(&config.calibration_path)?;
            println!("display: {:?} px, normal {:?}", plane.resolution(), plane.normal());
            println!(
                "calibration: fx {:.2} fy {:.2} cx {:.2} cy {:.2}, reprojection error {:?}",
                calibration.fx(),
                calibration.fy(),
                calibration.cx(),
                calibration.cy(),
                calibration.reprojection_error
            );
        }
    }
    Ok(())
}
