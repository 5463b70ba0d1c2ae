//! Presentation layer for gatekeeper
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters, and the console escalation handler.

pub mod cli;
pub mod escalation;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat};
pub use escalation::ConsoleEscalation;
pub use output::console::ConsoleFormatter;
pub use output::status::StatusView;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
