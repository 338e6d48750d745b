//! Structured logging with box-drawing output.
//!
//! Everything vakitd prints goes through the macros defined here so the daemon,
//! the `times` report and the simulator share one visual style:
//!
//! ```text
//! ┏ vakitd v0.4.0 ━━╸
//! ┃
//! ┣ Loading configuration
//! ┃   Location: 41.0082°N, 28.9784°E (Europe/Istanbul)
//! ┣[INFO] Next event: Asr adhan at 17:07
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - `log_block_start!` opens a new conceptual block (`┃` spacer, then `┣ message`).
//! - `log_decorated!` continues a block or prints a single status line.
//! - `log_indented!` lists details belonging to the line above it.
//! - `log_pipe!` inserts an empty `┃` before a semantic message that starts
//!   its own block (`log_info!`, `log_warning!`, `log_error!`, ...).
//! - `log_version!` / `log_end!` open and close the whole session.
//!
//! Output can be silenced at runtime (`Log::set_enabled(false)`) and redirected
//! to a file with ANSI codes stripped (`Log::start_file_logging`). While the
//! clock is simulated each line is prefixed with the simulated wall time.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Timezone of the configured location, used for simulated timestamps
static LOCATION_TIMEZONE: OnceLock<chrono_tz::Tz> = OnceLock::new();

// Set when --log routes output to a file
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Severity tag rendered between the pipe glyph and the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warning,
    Error,
    Critical,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "\x1b[32mINFO\x1b[0m",
            Level::Debug => "\x1b[32mDEBUG\x1b[0m",
            Level::Warning => "\x1b[33mWARNING\x1b[0m",
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Critical => "\x1b[31mCRITICAL\x1b[0m",
        }
    }
}

/// Line shapes produced by the macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Decorated,
    Indented,
    Block,
    Leveled(Level),
    Standalone(Level),
    Exit(Level),
}

/// Entry point used by the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Remember the location timezone so simulated timestamps read like
    /// the prayer times they are compared against.
    pub fn set_location_timezone(tz: chrono_tz::Tz) {
        let _ = LOCATION_TIMEZONE.set(tz);
    }

    /// Route all further output to `file_path` until the guard is dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;
            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// `[HH:MM:SS] ` while the clock is simulated, empty otherwise.
    pub fn timestamp_prefix() -> String {
        if !crate::time::source::is_initialized() || !crate::time::source::is_simulated() {
            return String::new();
        }
        let now = crate::time::source::now();
        match LOCATION_TIMEZONE.get() {
            Some(tz) => format!("[{}] ", now.with_timezone(tz).format("%H:%M:%S")),
            None => format!("[{}] ", now.with_timezone(&chrono::Local).format("%H:%M:%S")),
        }
    }

    /// Render one line in the given shape and write it out.
    pub fn emit(shape: Shape, message: &str) {
        if !Self::is_enabled() {
            return;
        }
        let prefix = Self::timestamp_prefix();
        let text = match shape {
            Shape::Decorated => format!("{prefix}┣ {message}\n"),
            Shape::Indented => format!("{prefix}┃   {message}\n"),
            Shape::Block => format!("{prefix}┃\n{prefix}┣ {message}\n"),
            Shape::Leveled(level) => format!("{prefix}┣[{}] {message}\n", level.tag()),
            Shape::Standalone(level) => format!("{prefix}[{}] {message}\n", level.tag()),
            Shape::Exit(level) => format!("{prefix}┃\n{prefix}┗[{}] {message}\n", level.tag()),
        };
        write_output(&text);
    }

    /// Emit a message-less glyph line (`┃`, `╹` or the version header).
    pub fn emit_raw(line: &str) {
        if !Self::is_enabled() {
            return;
        }
        let prefix = Self::timestamp_prefix();
        write_output(&format!("{prefix}{line}\n"));
    }
}

/// Keeps the file logger thread alive; flushes and joins it on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

/// Continue a block, or print a single status line.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Decorated,
            &format!($($arg)*),
        )
    };
}

/// Detail line nested under the previous message.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Indented,
            &format!($($arg)*),
        )
    };
}

/// Empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::Log::emit_raw("┃")
    };
}

/// Open a new block of related output.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Block,
            &format!($($arg)*),
        )
    };
}

/// Session header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::Log::emit_raw(&format!(
            "┏ vakitd v{} ━━╸",
            env!("CARGO_PKG_VERSION")
        ))
    };
}

/// Session terminator.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::Log::emit_raw("╹")
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Leveled($crate::common::logger::Level::Info),
            &format!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Leveled($crate::common::logger::Level::Debug),
            &format!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Leveled($crate::common::logger::Level::Warning),
            &format!($($arg)*),
        )
    };
}

/// Warning without the pipe glyph, for output outside a session (help, CLI errors).
#[macro_export]
macro_rules! log_warning_standalone {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Standalone($crate::common::logger::Level::Warning),
            &format!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Leveled($crate::common::logger::Level::Error),
            &format!($($arg)*),
        )
    };
}

/// Error that terminates the current flow (`┗[ERROR]`).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Exit($crate::common::logger::Level::Error),
            &format!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)*) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Shape::Leveled($crate::common::logger::Level::Critical),
            &format!($($arg)*),
        )
    };
}
