use crate::asset::{
    AssetClass,
    Operation,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

const DEFAULT_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A single user-facing message produced at an action boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub severity: Severity,
    pub class: AssetClass,
    pub operation: Operation,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        write!(
            f,
            "[{}] {tag} {} {}: {}",
            self.at.format("%H:%M:%S"),
            self.class,
            self.operation,
            self.message
        )
    }
}

/// Shared, bounded log of notices; oldest entries fall off first.
#[derive(Clone, Debug)]
pub struct NoticeBoard {
    entries: Arc<Mutex<VecDeque<Notice>>>,
    capacity: usize,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NoticeBoard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, notice: Notice) {
        let mut entries = self.lock();
        entries.push_back(notice);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<Notice> {
        self.lock().back().cloned()
    }

    pub fn entries(&self) -> Vec<Notice> {
        self.lock().iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.lock().iter().filter(|n| n.is_error()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notice>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
