use chrono::Local;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Maximum number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 1000;

/// A log entry with timestamp and message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message,
        }
    }

    /// Format for display in the log panel
    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe ring buffer for log entries
#[derive(Clone, Default)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES))),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = lock(&self.entries);
        if entries.len() >= MAX_LOG_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let entries = lock(&self.entries);
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Log directory, `~/.local/share/scheduler-grid/logs` when a data dir is known
fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("scheduler-grid").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("scheduler-grid"))
}

/// Append-only log file with a `latest.log` pointer
pub struct LogFile {
    file: Mutex<Option<File>>,
    path: PathBuf,
}

impl LogFile {
    pub fn open() -> Self {
        let log_dir = get_log_dir();
        let _ = std::fs::create_dir_all(&log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = log_dir.join(format!("scheduler-grid_{}.log", timestamp));

        #[cfg(unix)]
        {
            let latest_path = log_dir.join("latest.log");
            let _ = std::fs::remove_file(&latest_path);
            let _ = std::os::unix::fs::symlink(&path, &latest_path);
        }

        let file = OpenOptions::new().create(true).append(true).open(&path).ok();

        Self {
            file: Mutex::new(file),
            path,
        }
    }

    pub fn write_entry(&self, entry: &LogEntry) {
        if let Some(file) = lock(&self.file).as_mut() {
            let _ = writeln!(file, "{}", entry.format_for_display());
            let _ = file.flush();
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Split a compact-format line ("LEVEL target: message") into its parts
pub fn parse_compact_line(line: &str) -> (Level, &str, &str) {
    let levels = [
        ("TRACE ", Level::TRACE),
        ("DEBUG ", Level::DEBUG),
        ("INFO ", Level::INFO),
        ("WARN ", Level::WARN),
        ("ERROR ", Level::ERROR),
    ];
    let trimmed = line.trim_start();
    let Some((level, rest)) = levels
        .iter()
        .find_map(|(prefix, level)| trimmed.strip_prefix(prefix).map(|rest| (*level, rest.trim_start())))
    else {
        return (Level::INFO, "general", line.trim());
    };

    match rest.find(':') {
        Some(colon) if !rest[..colon].contains(' ') => {
            (level, &rest[..colon], rest[colon + 1..].trim())
        }
        _ => (level, "general", rest.trim()),
    }
}

/// Writer feeding both the ring buffer (log panel) and the log file
#[derive(Clone)]
pub struct DualWriter {
    buffer: LogRingBuffer,
    file: Option<Arc<LogFile>>,
}

impl DualWriter {
    pub fn new(buffer: LogRingBuffer, file: Option<Arc<LogFile>>) -> Self {
        Self { buffer, file }
    }
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(message) = std::str::from_utf8(buf) {
            for line in message.lines().filter(|l| !l.trim().is_empty()) {
                let (level, target, msg) = parse_compact_line(line);
                let entry = LogEntry::new(level, target, msg.to_string());
                if let Some(file) = &self.file {
                    file.write_entry(&entry);
                }
                self.buffer.push(entry);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DualWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Global log buffer accessible throughout the application
static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();

/// Get the global log buffer
pub fn get_log_buffer() -> Option<LogRingBuffer> {
    LOG_BUFFER.get().cloned()
}

/// Initialize tracing with ring buffer + file output.
///
/// Nothing is written to the terminal, which belongs to the TUI.
/// `RUST_LOG` overrides the default `debug` filter.
pub fn init_tracing() -> LogRingBuffer {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let buffer = LOG_BUFFER.get_or_init(LogRingBuffer::new).clone();
    let file = Arc::new(LogFile::open());
    let log_path = file.path().clone();
    let writer = DualWriter::new(buffer.clone(), Some(file));

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time()
        .compact();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::info!(target: "app", "logging to {}", log_path.display());
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_is_bounded() {
        let buffer = LogRingBuffer::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            buffer.push(LogEntry::new(Level::INFO, "test", format!("entry {}", i)));
        }
        assert_eq!(buffer.len(), MAX_LOG_ENTRIES);
        let recent = buffer.get_recent(2);
        assert_eq!(recent[1].message, format!("entry {}", MAX_LOG_ENTRIES + 9));
        assert_eq!(recent[0].message, format!("entry {}", MAX_LOG_ENTRIES + 8));
    }

    #[test]
    fn test_parse_compact_line() {
        let (level, target, msg) = parse_compact_line("WARN dragdrop: rejected drop: Invalid column");
        assert_eq!(level, Level::WARN);
        assert_eq!(target, "dragdrop");
        assert_eq!(msg, "rejected drop: Invalid column");

        let (level, target, msg) = parse_compact_line("plain text");
        assert_eq!(level, Level::INFO);
        assert_eq!(target, "general");
        assert_eq!(msg, "plain text");
    }

    #[test]
    fn test_dual_writer_feeds_buffer() {
        let buffer = LogRingBuffer::new();
        let mut writer = DualWriter::new(buffer.clone(), None);
        writer
            .write_all(b" INFO store: loaded 3 teachers (v1)\nDEBUG viewport: rows changed\n")
            .unwrap();
        let entries = buffer.get_recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target, "store");
        assert_eq!(entries[1].level, "DEBUG");
    }
}
