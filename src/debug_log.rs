//! Debug logging for diagnosing slow or surprising runs.
//!
//! Enable by setting environment variable: SESSIONIZE_DEBUG_LOG=1
//! Logs are written to `sessionize-debug.log` in the system temp directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<std::sync::Mutex<std::fs::File>> = OnceLock::new();

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("sessionize-debug.log")
}

/// Initialize debug logging. Call once at startup.
pub fn init() {
    if std::env::var("SESSIONIZE_DEBUG_LOG").is_err() {
        return;
    }

    let path = log_path();
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("⚠️  Could not open debug log {}: {e}", path.display());
            return;
        }
    };

    START_TIME.get_or_init(Instant::now);
    LOG_FILE.get_or_init(|| std::sync::Mutex::new(file));
    ENABLED.store(true, Ordering::SeqCst);
    log("DEBUG", "init", "Debug logging initialized");
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with timestamp and thread ID.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);
    let thread_id = std::thread::current().id();

    let msg = format!(
        "[{:>8}ms] [{:?}] [{}] {} - {}\n",
        elapsed, thread_id, category, action, detail
    );

    if let Some(file_mutex) = LOG_FILE.get()
        && let Ok(mut file) = file_mutex.lock()
    {
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}

/// RAII guard that logs the duration of a pipeline stage when dropped.
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn new(stage: &'static str) -> Self {
        if is_enabled() {
            log("STAGE", "START", stage);
        }
        Self {
            stage,
            started: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        if is_enabled() {
            let detail = format!("{} ({} µs)", self.stage, self.started.elapsed().as_micros());
            log("STAGE", "DONE", &detail);
        }
    }
}
