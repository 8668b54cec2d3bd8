//! Core types: chat events, line formatting, tracing setup

pub mod event;
pub mod format;
pub mod tracing;

pub use event::{ChatEvent, DanmuMessage, GiftMessage, Medal, SuperChatMessage};
pub use format::{FormatOptions, LineFormatter, OutputFormat};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
