use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facelog_core::{match_frame, EuclideanMatcher, FaceEncoder, Gallery, OnnxFaceEncoder};
use facelog_hw::{Camera, FrameSource};
use facelog_notify::{CooldownGate, HttpTransport, Notifier, NotifyOutcome, SubjectDirectory};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "facelog", about = "facelog attendance CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Directory holding det_10g.onnx and w600k_r50.onnx
    #[arg(long, env = "FACELOG_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    /// Directory of reference photos named after each subject
    #[arg(long, env = "FACELOG_GALLERY_DIR", default_value = "images")]
    gallery_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture devices
    Devices,
    /// Grab one frame and save it as a grayscale PNG
    Snapshot {
        #[arg(long, env = "FACELOG_CAMERA_DEVICE", default_value = "/dev/video0")]
        device: String,
        /// Output file
        #[arg(short, long, default_value = "snapshot.png")]
        out: PathBuf,
    },
    /// Encode the gallery and print one line per loaded subject
    Gallery {
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Match every face in a photo against the gallery
    Identify {
        /// Photo to identify
        image: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
        /// Largest distance accepted as a match
        #[arg(long, env = "FACELOG_DISTANCE_THRESHOLD", default_value_t = 1.0)]
        threshold: f32,
    },
    /// Print the subject table
    Subjects {
        /// TOML table to use instead of the built-in one
        #[arg(long, env = "FACELOG_SUBJECTS_PATH")]
        subjects: Option<PathBuf>,
    },
    /// Send a single check-in for a subject name
    Notify {
        /// Subject name, e.g. "DR. JOHN SMITH"
        name: String,
        #[arg(long)]
        confidence: Option<f32>,
        #[arg(long, env = "FACELOG_SUBJECTS_PATH")]
        subjects: Option<PathBuf>,
        #[arg(
            long,
            env = "FACELOG_ENDPOINT_URL",
            default_value = "http://127.0.0.1:54321/functions/v1/record-attendance"
        )]
        endpoint: reqwest::Url,
        #[arg(long, env = "FACELOG_API_KEY", hide_env_values = true, default_value = "")]
        api_key: String,
        #[arg(long, env = "FACELOG_CAMERA_LOCATION", default_value = "Main Entrance Camera")]
        location: String,
        /// Request timeout in seconds
        #[arg(long, env = "FACELOG_HTTP_TIMEOUT_SECS", default_value_t = 30)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}\t{}\t{} ({})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Snapshot { device, out } => {
            let camera = Camera::open(&device)?;
            let mut stream = camera.stream()?;
            // First frames are often black while exposure settles.
            let mut frame = stream.next_frame()?;
            for _ in 0..4 {
                if !frame.is_dark {
                    break;
                }
                frame = stream.next_frame()?;
            }
            let img = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
                .context("frame buffer does not match its dimensions")?;
            img.save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "{}x{} frame from {} (brightness {:.1}{}) saved to {}",
                frame.width,
                frame.height,
                camera.device_path,
                frame.avg_brightness(),
                if frame.is_dark { ", dark" } else { "" },
                out.display()
            );
        }
        Commands::Gallery { models } => {
            let mut encoder = load_encoder(&models)?;
            let gallery = Gallery::load(&models.gallery_dir, &mut encoder)?;
            for entry in gallery.entries() {
                println!("{}\t{}", entry.label, entry.source.display());
            }
            println!("{} subject(s) loaded from {}", gallery.len(), models.gallery_dir.display());
        }
        Commands::Identify { image, models, threshold } => {
            let mut encoder = load_encoder(&models)?;
            let gallery = Gallery::load(&models.gallery_dir, &mut encoder)?;

            let gray = image::open(&image)
                .with_context(|| format!("failed to decode {}", image.display()))?
                .to_luma8();
            let (width, height) = gray.dimensions();
            let detections = encoder.encode(gray.as_raw(), width, height)?;
            let results = match_frame(&EuclideanMatcher, &detections, gallery.entries(), threshold);

            let faces: Vec<serde_json::Value> = detections
                .iter()
                .zip(&results)
                .map(|(d, r)| {
                    serde_json::json!({
                        "label": r.display_label(),
                        "matched": r.matched,
                        "distance": r.distance,
                        "confidence": r.confidence(),
                        "box": d.bbox.pixel_corners(),
                        "detector_score": d.bbox.confidence,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&faces)?);
        }
        Commands::Subjects { subjects } => {
            let directory = load_directory(subjects.as_deref())?;
            for (name, id) in directory.entries() {
                println!("{id}\t{name}");
            }
        }
        Commands::Notify {
            name,
            confidence,
            subjects,
            endpoint,
            api_key,
            location,
            timeout,
        } => {
            let directory = load_directory(subjects.as_deref())?;
            let transport = HttpTransport::new(endpoint, api_key, Duration::from_secs(timeout))?;
            let notifier = Notifier::new(directory, transport, location);
            let mut gate = CooldownGate::default();

            match notifier.try_notify(&mut gate, &name, confidence, Instant::now()) {
                NotifyOutcome::Sent { subject_id } => println!("Recorded check-in for {name} (id {subject_id})"),
                NotifyOutcome::UnknownSubject => bail!("no subject id for {name:?}"),
                NotifyOutcome::Failed { subject_id, kind } => {
                    bail!("delivery for {name} (id {subject_id}) failed: {kind:?}")
                }
                NotifyOutcome::CoolingDown { subject_id } => bail!("subject {subject_id} is cooling down"),
            }
        }
    }

    Ok(())
}

fn load_encoder(models: &ModelArgs) -> Result<OnnxFaceEncoder> {
    let dir = models.model_dir.clone().unwrap_or_else(default_model_dir);
    OnnxFaceEncoder::load(&dir).with_context(|| format!("failed to load models from {}", dir.display()))
}

fn load_directory(path: Option<&Path>) -> Result<SubjectDirectory> {
    Ok(match path {
        Some(p) => SubjectDirectory::load(p)?,
        None => SubjectDirectory::builtin()?,
    })
}

/// `$XDG_DATA_HOME/facelog/models`, falling back to `~/.local/share`.
fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facelog/models")
}
