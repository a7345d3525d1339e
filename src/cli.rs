//! Command-line arguments.

use clap::{Parser, ValueEnum};

/// Output format for tracing logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable output for development.
    #[default]
    Pretty,
    /// Structured JSON for log aggregation.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tempo", about = "Automatic timetable generation service")]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}
