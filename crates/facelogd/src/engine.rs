use crate::config::Config;
use facelog_core::{
    match_frame, EncodeError, EuclideanMatcher, FaceEncoder, Gallery, GalleryError, MatchResult, OnnxFaceEncoder,
};
use facelog_hw::{Camera, CameraError, FrameSource};
use facelog_notify::{CooldownGate, HttpTransport, Notifier, NotifyOutcome, SubjectDirectory, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("model error: {0}")]
    Encoder(#[from] EncodeError),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
    #[error("invalid endpoint URL {url}: {reason}")]
    Endpoint { url: String, reason: String },
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited during startup")]
    ThreadExited,
}

/// Handle to the running capture loop.
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl EngineHandle {
    /// Ask the loop to stop after the current frame and wait for it.
    ///
    /// The camera is released when the engine thread returns.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.thread.join().is_err() {
            tracing::error!("engine thread panicked");
        }
    }
}

/// Per-run counters, logged when the loop exits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub capture_errors: u64,
    pub dark_frames: u64,
    pub faces: u64,
    pub unknown_faces: u64,
    pub sent: u64,
    pub failed: u64,
}

/// One face of a frame after matching and, if matched, the notify attempt.
#[derive(Debug, Clone)]
pub struct FaceOutcome {
    pub result: MatchResult,
    pub notify: Option<NotifyOutcome>,
}

/// Start the capture loop on a dedicated OS thread.
///
/// Models, gallery, camera and HTTP client are all set up on that thread
/// before this returns; any failure there is returned here and the thread
/// has already exited.
pub fn spawn_engine(config: Config, directory: SubjectDirectory) -> Result<EngineHandle, EngineError> {
    let stop = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), EngineError>>();

    let thread_stop = Arc::clone(&stop);
    let thread = std::thread::Builder::new()
        .name("facelog-engine".into())
        .spawn(move || engine_thread(config, directory, ready_tx, &thread_stop))
        .map_err(EngineError::Spawn)?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(EngineHandle { stop, thread }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(EngineError::ThreadExited)
        }
    }
}

fn engine_thread(
    config: Config,
    directory: SubjectDirectory,
    ready: mpsc::Sender<Result<(), EngineError>>,
    stop: &AtomicBool,
) {
    let (camera, mut encoder, gallery, notifier) = match start(&config, directory) {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stream = match camera.stream() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    if config.warmup_frames > 0 {
        tracing::info!(count = config.warmup_frames, "discarding warmup frames");
        for _ in 0..config.warmup_frames {
            let _ = stream.next_frame();
        }
    }

    let _ = ready.send(Ok(()));
    tracing::info!("engine thread started");

    let stats = run_loop(&mut stream, &mut encoder, &gallery, &notifier, &config, stop);
    tracing::info!(?stats, "engine thread exiting");
}

type Started = (Camera, OnnxFaceEncoder, Gallery, Notifier<HttpTransport>);

fn start(config: &Config, directory: SubjectDirectory) -> Result<Started, EngineError> {
    let endpoint = reqwest::Url::parse(&config.endpoint_url).map_err(|e| EngineError::Endpoint {
        url: config.endpoint_url.clone(),
        reason: e.to_string(),
    })?;

    let mut encoder = OnnxFaceEncoder::load(&config.model_dir)?;
    tracing::info!(dir = %config.model_dir.display(), "face models loaded");

    let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
    if gallery.is_empty() {
        tracing::warn!(dir = %config.gallery_dir.display(), "gallery is empty; every face will be UNKNOWN");
    }
    for entry in gallery.entries() {
        if directory.resolve(&entry.label).is_none() {
            tracing::warn!(label = %entry.label, "gallery subject has no id in the subject table");
        }
    }

    let camera = Camera::open(&config.camera_device)?;

    let transport = HttpTransport::new(endpoint, config.api_key.clone(), config.http_timeout())?;
    tracing::info!(endpoint = %transport.endpoint(), location = %config.camera_location, "notifier ready");
    let notifier = Notifier::new(directory, transport, config.camera_location.clone());

    Ok((camera, encoder, gallery, notifier))
}

/// Capture, match and notify until `stop` is set.
///
/// Frame-level failures are logged and never end the loop.
pub fn run_loop<S, E, T>(
    source: &mut S,
    encoder: &mut E,
    gallery: &Gallery,
    notifier: &Notifier<T>,
    config: &Config,
    stop: &AtomicBool,
) -> LoopStats
where
    S: FrameSource + ?Sized,
    E: FaceEncoder + ?Sized,
    T: Transport,
{
    let mut gate = CooldownGate::new(config.cooldown());
    let mut stats = LoopStats::default();

    while !stop.load(Ordering::Relaxed) {
        let frame = match source.next_frame() {
            Ok(f) => f,
            Err(e) => {
                stats.capture_errors += 1;
                tracing::warn!(error = %e, "failed to grab frame, retrying");
                std::thread::sleep(config.capture_retry());
                continue;
            }
        };
        stats.frames += 1;

        if frame.is_dark {
            stats.dark_frames += 1;
            tracing::trace!(seq = frame.sequence, brightness = frame.avg_brightness(), "skipping dark frame");
            continue;
        }

        let detections = match encoder.encode(&frame.data, frame.width, frame.height) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face encoding failed; frame skipped");
                continue;
            }
        };

        let results = match_frame(&EuclideanMatcher, &detections, gallery.entries(), config.distance_threshold);
        for (detection, result) in detections.iter().zip(results) {
            stats.faces += 1;
            let outcome = notify_match(result, notifier, &mut gate, Instant::now());
            if !outcome.result.matched {
                stats.unknown_faces += 1;
                tracing::debug!(bbox = ?detection.bbox.pixel_corners(), distance = outcome.result.distance, "unknown face");
            }
            match outcome.notify {
                Some(NotifyOutcome::Sent { .. }) => stats.sent += 1,
                Some(NotifyOutcome::Failed { .. }) => stats.failed += 1,
                _ => {}
            }
        }
    }

    stats
}

/// Hand a matched face to the notifier; unknown faces are not notified.
pub fn notify_match<T: Transport>(
    result: MatchResult,
    notifier: &Notifier<T>,
    gate: &mut CooldownGate,
    now: Instant,
) -> FaceOutcome {
    let notify = match (&result.label, result.matched) {
        (Some(label), true) => Some(notifier.try_notify(gate, label, Some(result.confidence()), now)),
        _ => None,
    };
    FaceOutcome { result, notify }
}
