use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "OK",
            LogLevel::Error => "ERR",
            LogLevel::Warning => "WARN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: u64,
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub level: LogLevel,
    pub message: String,
    /// Username of the account the entry is tied to, if any.
    pub account: Option<String>,
}

struct Inner {
    records: VecDeque<LogRecord>,
    next_id: u64,
}

/// Append-only activity log, bounded to a fixed capacity with oldest-entry
/// eviction. An optional tap receives a copy of every record as it is
/// appended (the console feed in the binary hangs off this).
pub struct LogBook {
    inner: Mutex<Inner>,
    capacity: usize,
    tap: Option<mpsc::UnboundedSender<LogRecord>>,
}

impl LogBook {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    pub fn with_tap(capacity: usize, tap: mpsc::UnboundedSender<LogRecord>) -> Self {
        Self::build(capacity, Some(tap))
    }

    fn build(capacity: usize, tap: Option<mpsc::UnboundedSender<LogRecord>>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity),
                next_id: 0,
            }),
            capacity,
            tap,
        }
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>, account: Option<&str>) {
        let record = {
            let mut inner = self.inner.lock().expect("logbook lock poisoned");
            let record = LogRecord {
                id: inner.next_id,
                timestamp: chrono::Local::now(),
                level,
                message: message.into(),
                account: account.map(str::to_string),
            };
            inner.next_id += 1;
            if inner.records.len() >= self.capacity {
                inner.records.pop_front();
            }
            inner.records.push_back(record.clone());
            record
        };
        if let Some(tap) = &self.tap {
            // Receiver may be gone during shutdown; the ring buffer still has it.
            let _ = tap.send(record);
        }
    }

    /// Snapshot of the retained records, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        let inner = self.inner.lock().expect("logbook lock poisoned");
        inner.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("logbook lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all retained records. Ids keep counting up.
    pub fn clear(&self) {
        self.inner.lock().expect("logbook lock poisoned").records.clear();
    }
}
