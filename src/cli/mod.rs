//! Command line interface

pub mod args;
pub mod output;

pub use args::{Args, MediaKind, VerbosityLevel};
pub use output::OutputFormatter;
