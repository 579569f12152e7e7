//! Common types shared by the browser's networking components.

pub mod console;
pub mod error;
pub mod settings;

pub use console::{Console, ConsoleLog, ConsoleMessage, MessageCategory, MessageLevel, TracingConsole};
pub use error::{BrowserError, BrowserResult};
pub use settings::{MemorySettings, SettingKey, SettingValue, Settings};
