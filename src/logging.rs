//! ctup Logging System
//!
//! Timestamped, level-prefixed log lines. Library callers get stderr output;
//! the CLI calls `init_logger()` to additionally write a log file with a
//! short system header.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::process::Command;
use std::sync::OnceLock;

static LOGGER: OnceLock<Mutex<CtupLogger>> = OnceLock::new();

// ============================================================================
// System Header
// ============================================================================

fn detect_kernel() -> String {
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

fn detect_distro() -> String {
    if let Ok(file) = File::open("/etc/os-release") {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                return name.trim_matches('"').to_string();
            }
        }
    }
    "Unknown".to_string()
}

fn log_header() -> String {
    let flatpak = std::path::Path::new("/.flatpak-info").exists();
    format!(
        r#"================================================================================
ctup Log - {}
================================================================================
Application:   ctup v{}
  Distro:      {}
  Kernel:      {}
  Flatpak:     {}
================================================================================"#,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        env!("CARGO_PKG_VERSION"),
        detect_distro(),
        detect_kernel(),
        flatpak
    )
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Download,
    Install,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Download => "[DOWNLOAD]",
            LogLevel::Install => "[INSTALL]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

#[derive(Default)]
pub struct CtupLogger {
    log_file: Option<File>,
}

impl CtupLogger {
    fn with_file() -> Self {
        let log_dir = crate::ctup_path!("logs");
        let _ = fs::create_dir_all(&log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("ctup_{}.log", timestamp));

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        let mut logger = Self { log_file };
        logger.write_raw(&log_header());
        logger
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }

        eprintln!("{}", msg);
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        self.write_raw(&formatted);
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global logger with a log file (call once at startup)
pub fn init_logger() {
    LOGGER.get_or_init(|| Mutex::new(CtupLogger::with_file()));
}

fn logger() -> &'static Mutex<CtupLogger> {
    LOGGER.get_or_init(|| Mutex::new(CtupLogger::default()))
}

pub fn log_info(message: &str) {
    logger().lock().log(LogLevel::Info, message);
}

pub fn log_download(message: &str) {
    logger().lock().log(LogLevel::Download, message);
}

pub fn log_install(message: &str) {
    logger().lock().log(LogLevel::Install, message);
}

pub fn log_warning(message: &str) {
    logger().lock().log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    logger().lock().log(LogLevel::Error, message);
}
