//! Session logger — the `log` backend for the studio and the CLI.
//!
//! In the studio every record goes to a single file in the OS data directory.
//! The file is **truncated at each launch**, so it only ever holds the most
//! recent session. Warnings and errors are mirrored to stderr.
//!
//! Log location:
//!   Windows:  `%APPDATA%\ColoringFE\coloringfe.log`
//!   Linux:    `~/.local/share/ColoringFE/coloringfe.log`
//!   macOS:    `~/Library/Application Support/ColoringFE/coloringfe.log`
//!
//! The CLI skips the file and writes to stderr at the level picked by `--verbose`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

struct SessionLogger {
    file: Option<(Mutex<File>, PathBuf)>,
    level: LevelFilter,
    /// Records at or above this severity also go to stderr.
    stderr_level: LevelFilter,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&timestamp(), record.level(), &record.args().to_string());
        if let Some((mutex, _)) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = writeln!(file, "{}", line);
        }
        if record.level() <= self.stderr_level {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some((mutex, _)) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// `[HH:MM:SS] [LEVEL] msg`
pub fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level, msg)
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOGGER.get().and_then(|l| l.file.as_ref().map(|(_, p)| p))
}

fn install(logger: SessionLogger) {
    let level = logger.level;
    if LOGGER.set(logger).is_err() {
        return;
    }
    if let Some(logger) = LOGGER.get()
        && log::set_logger(logger).is_ok()
    {
        log::set_max_level(level);
    }
}

/// Initialise the studio logger. Call once before any logging.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init() {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    let file = match file {
        Ok(f) => Some((Mutex::new(f), path.clone())),
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            None
        }
    };
    let has_file = file.is_some();

    install(SessionLogger {
        file,
        level: LevelFilter::Debug,
        stderr_level: LevelFilter::Warn,
    });

    if has_file {
        log::info!("=== ColoringFE session started {} ===", human_timestamp());
        log::info!("Log file: {}", path.display());
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC: {}", info);
        log::logger().flush();
        prev(info);
    }));
}

/// Stderr-only logger for headless runs.
pub fn init_cli(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    install(SessionLogger {
        file: None,
        level,
        stderr_level: level,
    });
}

fn log_file_path() -> PathBuf {
    data_dir().join("ColoringFE").join("coloringfe.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        assert_eq!(
            format_line("01:02:03", Level::Warn, "low memory"),
            "[01:02:03] [WARN] low memory"
        );
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }

    #[test]
    fn log_file_lives_under_app_folder() {
        let path = log_file_path();
        assert!(path.ends_with("ColoringFE/coloringfe.log"));
    }
}
