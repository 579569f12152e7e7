//! Console messages (the browser's error console).

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::SystemTime;

/// Source of a console message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MessageCategory {
    Network,
    Security,
    JavaScript,
    Other,
}

/// Severity of a console message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MessageLevel {
    Debug,
    Log,
    Warning,
    Error,
}

/// A recorded console message.
#[derive(Clone, Debug, Serialize)]
pub struct ConsoleMessage {
    pub text: String,
    pub category: MessageCategory,
    pub level: MessageLevel,
    pub time: SystemTime,
}

/// Logging collaborator.
pub trait Console: Send + Sync {
    fn add_message(&self, text: &str, category: MessageCategory, level: MessageLevel);
}

/// Console that forwards every message to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn add_message(&self, text: &str, category: MessageCategory, level: MessageLevel) {
        match level {
            MessageLevel::Debug => tracing::debug!(?category, "{}", text),
            MessageLevel::Log => tracing::info!(?category, "{}", text),
            MessageLevel::Warning => tracing::warn!(?category, "{}", text),
            MessageLevel::Error => tracing::error!(?category, "{}", text),
        }
    }
}

/// Bounded console history, also forwarded to `tracing`.
#[derive(Debug)]
pub struct ConsoleLog {
    messages: RwLock<VecDeque<ConsoleMessage>>,
    capacity: usize,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the recorded messages, oldest first.
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages.read().iter().cloned().collect()
    }

    /// Messages of one category.
    pub fn messages_in(&self, category: MessageCategory) -> Vec<ConsoleMessage> {
        self.messages
            .read()
            .iter()
            .filter(|message| message.category == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for ConsoleLog {
    fn add_message(&self, text: &str, category: MessageCategory, level: MessageLevel) {
        TracingConsole.add_message(text, category, level);

        let mut messages = self.messages.write();
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(ConsoleMessage {
            text: text.to_string(),
            category,
            level,
            time: SystemTime::now(),
        });
    }
}
