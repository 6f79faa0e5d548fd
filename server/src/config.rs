use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATASET_PATH: &str = "history.csv";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_SERVER_PORT: u16 = 3000;
/// Pause before an apply recompute so clients can show the busy state.
pub const DEFAULT_RECOMPUTE_YIELD_MS: u64 = 50;

// Map timeline label layout
pub const DEFAULT_TIMELINE_WIDTH_PX: f64 = 800.0;
pub const TIMELINE_LABEL_MIN_SPACING_PX: f64 = 60.0;

pub fn dataset_path() -> PathBuf {
    std::env::var("DATASET_PATH")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH))
}

pub fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR))
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Zero is allowed and disables the pause.
pub fn recompute_yield() -> Duration {
    std::env::var("RECOMPUTE_YIELD_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_RECOMPUTE_YIELD_MS))
}
