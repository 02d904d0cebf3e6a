use std::path::PathBuf;
use std::time::Duration;

/// Local Supabase edge-function address used when no endpoint is configured.
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:54321/functions/v1/record-attendance";

/// Euclidean distance on unit ArcFace embeddings, about cosine similarity 0.5.
/// Accepted matches keep a `1 - distance` confidence of at least zero.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 1.0;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the SCRFD and ArcFace ONNX files.
    pub model_dir: PathBuf,
    /// Directory of reference photos, one per subject, named after the subject.
    pub gallery_dir: PathBuf,
    /// Optional TOML subject table replacing the built-in one.
    pub subjects_path: Option<PathBuf>,
    /// Attendance recording endpoint.
    pub endpoint_url: String,
    /// Sent both as `apikey` and as the bearer token.
    pub api_key: String,
    /// Reported as `camera_location` in every event.
    pub camera_location: String,
    /// Largest embedding distance accepted as a match.
    pub distance_threshold: f32,
    /// Minimum spacing between two recorded events for one subject.
    pub cooldown_secs: u64,
    /// Whole-request timeout for the endpoint.
    pub http_timeout_secs: u64,
    /// Pause after a failed frame read.
    pub capture_retry_ms: u64,
    /// Frames discarded after opening the camera (auto exposure settling).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `FACELOG_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            camera_device: env_string("FACELOG_CAMERA_DEVICE", "/dev/video0"),
            model_dir: std::env::var("FACELOG_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir().join("models")),
            gallery_dir: PathBuf::from(env_string("FACELOG_GALLERY_DIR", "images")),
            subjects_path: std::env::var("FACELOG_SUBJECTS_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            endpoint_url: env_string("FACELOG_ENDPOINT_URL", DEFAULT_ENDPOINT),
            api_key: std::env::var("FACELOG_API_KEY").unwrap_or_default(),
            camera_location: env_string("FACELOG_CAMERA_LOCATION", "Main Entrance Camera"),
            distance_threshold: env_parse("FACELOG_DISTANCE_THRESHOLD", DEFAULT_DISTANCE_THRESHOLD),
            cooldown_secs: env_parse("FACELOG_COOLDOWN_SECS", 300),
            http_timeout_secs: env_parse("FACELOG_HTTP_TIMEOUT_SECS", 30),
            capture_retry_ms: env_parse("FACELOG_CAPTURE_RETRY_MS", 1000),
            warmup_frames: env_parse("FACELOG_WARMUP_FRAMES", 4),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn capture_retry(&self) -> Duration {
        Duration::from_millis(self.capture_retry_ms)
    }
}

/// `$XDG_DATA_HOME/facelog`, falling back to `~/.local/share/facelog`.
fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facelog")
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse `key`, keeping `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names: tests run in parallel and share
    // the process environment.

    #[test]
    fn test_env_parse_default_when_unset() {
        assert_eq!(env_parse("FACELOG_TEST_UNSET_U64", 300u64), 300);
    }

    #[test]
    fn test_env_parse_reads_value() {
        std::env::set_var("FACELOG_TEST_THRESHOLD", " 0.85 ");
        assert_eq!(env_parse("FACELOG_TEST_THRESHOLD", 1.10f32), 0.85);
    }

    #[test]
    fn test_env_parse_malformed_keeps_default() {
        std::env::set_var("FACELOG_TEST_BAD_SECS", "five minutes");
        assert_eq!(env_parse("FACELOG_TEST_BAD_SECS", 300u64), 300);
    }

    #[test]
    fn test_env_string_empty_means_default() {
        std::env::set_var("FACELOG_TEST_EMPTY_LOCATION", "");
        assert_eq!(env_string("FACELOG_TEST_EMPTY_LOCATION", "Lobby"), "Lobby");
    }

    #[test]
    fn test_default_threshold_keeps_confidence_informative() {
        assert!(DEFAULT_DISTANCE_THRESHOLD <= 1.0);
        let near_edge = facelog_core::MatchResult {
            matched: true,
            distance: DEFAULT_DISTANCE_THRESHOLD - 0.05,
            index: Some(0),
            label: Some("DR. JOHN SMITH".into()),
        };
        assert!(near_edge.confidence() > 0.0);
    }

    #[test]
    fn test_durations() {
        let mut cfg = Config::from_env();
        cfg.cooldown_secs = 300;
        cfg.capture_retry_ms = 1000;
        cfg.http_timeout_secs = 30;
        assert_eq!(cfg.cooldown(), Duration::from_secs(300));
        assert_eq!(cfg.capture_retry(), Duration::from_secs(1));
        assert_eq!(cfg.http_timeout(), Duration::from_secs(30));
    }
}
