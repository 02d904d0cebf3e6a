use anyhow::{Context, Result};
use facelog_notify::SubjectDirectory;
use std::io::BufRead;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facelogd starting");

    let config = config::Config::from_env();
    tracing::info!(
        camera = %config.camera_device,
        models = %config.model_dir.display(),
        gallery = %config.gallery_dir.display(),
        threshold = config.distance_threshold,
        cooldown_secs = config.cooldown_secs,
        "configuration loaded"
    );

    let directory = match &config.subjects_path {
        Some(path) => SubjectDirectory::load(path)
            .with_context(|| format!("failed to load subject table {}", path.display()))?,
        None => SubjectDirectory::builtin().context("built-in subject table is invalid")?,
    };
    tracing::info!(subjects = directory.len(), "subject table loaded");

    if config.api_key.is_empty() {
        tracing::warn!("FACELOG_API_KEY is not set; the endpoint will likely reject events");
    }

    // The engine owns blocking resources (camera, ONNX sessions, blocking HTTP
    // client) and must be created off the async runtime.
    let engine = tokio::task::spawn_blocking(move || engine::spawn_engine(config, directory))
        .await
        .context("engine startup task failed")?
        .context("failed to start engine")?;

    tracing::info!("facelogd ready; press 'q' then Enter or Ctrl-C to stop");

    let quit = spawn_quit_listener();
    let signal = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.map(|()| tracing::info!("interrupt received"))
        }
        Ok(()) = quit => {
            tracing::info!("quit requested");
            Ok(())
        }
    };

    tracing::info!("facelogd shutting down");
    tokio::task::spawn_blocking(move || engine.shutdown())
        .await
        .context("engine shutdown task failed")?;
    tracing::info!("camera released");

    signal.context("failed to listen for Ctrl-C")
}

/// Watch stdin on a detached thread; fires once a line reading `q` arrives.
///
/// A closed stdin (daemonized, piped from /dev/null) never fires.
fn spawn_quit_listener() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("facelog-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    let _ = tx.send(());
                    return;
                }
            }
            // Keep the sender alive so a closed stdin doesn't look like a quit.
            std::thread::park();
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "stdin listener unavailable; use Ctrl-C to stop");
    }
    rx
}
