//! CLI for replaying recorded face-mesh landmarks through the measurement pipeline.
//!
//! Usage:
//!   face-measure <recording.jsonl>                    # Human-readable output
//!   face-measure <recording.jsonl> --json             # JSON output
//!   face-measure <recording.jsonl> --overlay last.png # Save the last overlay frame

use clap::Parser;
use face_measure::{
    ClockedSource, Config, FrameOutcome, ImageOverlay, JsonLinesSource, ManualClock,
    NullRenderer, PipelineCoordinator, Renderer, RunSummary,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "face-measure")]
#[command(author, version, about = "Calibrated facial measurements from recorded landmarks", long_about = None)]
struct Args {
    /// Landmark recording (one JSON frame per line)
    #[arg(required = true)]
    input: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference eye distance in centimeters
    #[arg(long)]
    calibration_cm: Option<f32>,

    /// Minimum milliseconds between published updates
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Fat score jaw weight
    #[arg(long)]
    jaw_weight: Option<f32>,

    /// Fat score cheek weight
    #[arg(long)]
    cheek_weight: Option<f32>,

    /// Frame rate assumed for frames recorded without a timestamp
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Write the last rendered overlay frame to this PNG
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    input: String,
    calibration_cm: f32,
    throttle_interval_ms: u64,
    publications: Vec<Publication>,
    summary: RunSummary,
}

#[derive(Serialize)]
struct Publication {
    /// Frame index (1-based)
    frame: u64,
    /// Replay time of the frame
    t_ms: u64,
    /// Fat score × 100, as displayed
    fat_value: f32,
    fat_score: f32,
    jaw_width_cm: f32,
    face_height_cm: f32,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(cm) = args.calibration_cm {
        config.calibration_cm = cm;
    }
    if let Some(ms) = args.interval_ms {
        config.throttle_interval_ms = ms;
    }
    if let Some(w) = args.jaw_weight {
        config.weights.jaw = w;
    }
    if let Some(w) = args.cheek_weight {
        config.weights.cheek = w;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.fps == 0 {
        return Err("--fps must be greater than zero".into());
    }
    let config = load_config(args)?;

    let (publications, summary) = match args.overlay {
        Some(ref path) => {
            let overlay = ImageOverlay::new(config.frame_width, config.frame_height);
            let (publications, summary, overlay) = replay(args, &config, overlay)?;
            if overlay.frames_rendered() > 0 {
                overlay.save(path)?;
                tracing::info!("Overlay written to {:?}", path);
            } else {
                tracing::warn!("No face was rendered, overlay not written");
            }
            (publications, summary)
        }
        None => {
            let (publications, summary, _) = replay(args, &config, NullRenderer)?;
            (publications, summary)
        }
    };

    let output = Output {
        input: args.input.display().to_string(),
        calibration_cm: config.calibration_cm,
        throttle_interval_ms: config.throttle_interval_ms,
        publications,
        summary,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn replay<R: Renderer>(
    args: &Args,
    config: &Config,
    renderer: R,
) -> Result<(Vec<Publication>, RunSummary, R), Box<dyn std::error::Error>> {
    let clock = ManualClock::new();
    let frame_step = Duration::from_secs(1) / args.fps;
    let mut source = ClockedSource::new(JsonLinesSource::open(&args.input)?, clock.clone())
        .with_frame_step(frame_step);

    let mut pipeline = PipelineCoordinator::new(config, renderer, clock.clone())?;

    let mut publications = Vec::new();
    let mut frame = 0u64;
    let summary = pipeline.run(&mut source, |outcome| {
        frame += 1;
        if let FrameOutcome::Published(m) = outcome {
            publications.push(Publication {
                frame,
                t_ms: clock.elapsed().as_millis() as u64,
                fat_value: m.fat_value(),
                fat_score: m.fat_score,
                jaw_width_cm: m.jaw_width_cm,
                face_height_cm: m.face_height_cm,
            });
        }
    })?;

    Ok((publications, summary, pipeline.into_renderer()))
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Recording: {}\n", output.input));
    s.push_str(&format!(
        "Calibration: {:.1} cm eye distance, updates every {:.1} s\n",
        output.calibration_cm,
        output.throttle_interval_ms as f64 / 1000.0
    ));

    if output.publications.is_empty() {
        s.push_str("\nNo measurements published.\n");
    }

    for p in &output.publications {
        s.push_str(&format!("\n--- t = {:.1} s (frame {}) ---\n", p.t_ms as f64 / 1000.0, p.frame));
        s.push_str(&format!("  Face fat value: {:.2}\n", p.fat_value));
        s.push_str(&format!("  Jaw width:      {:.1} cm\n", p.jaw_width_cm));
        s.push_str(&format!("  Face height:    {:.1} cm\n", p.face_height_cm));
    }

    let summary = &output.summary;
    s.push_str(&format!(
        "\nFrames: {} (no face: {}, skipped: {}, throttled: {}, published: {})\n",
        summary.frames, summary.no_face, summary.skipped, summary.throttled, summary.published
    ));

    s
}
