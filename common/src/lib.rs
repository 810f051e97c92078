//! Shared value types and utilities for the RFS remote file tools.
//!
//! This crate holds the pieces the tools have in common: the error taxonomy
//! for remote operations, remote entry descriptors, include/exclude filtering,
//! local staging helpers and the tracing/output harness the binaries run under.

pub mod config;
pub mod descriptor;
pub mod errors;
pub mod filter;
pub mod localfs;
mod testutils;

pub use config::OutputConfig;
pub use descriptor::FileDescriptor;
pub use errors::{Error, Result};

/// Run a tool body under the standard tracing setup.
///
/// Initializes the global subscriber from the output configuration (`RUST_LOG`
/// takes precedence when set), invokes `func` and logs its error on failure.
/// Returns the summary on success, `None` on failure; the caller decides the
/// process exit code.
pub fn run<SummaryT, FuncT>(output: &OutputConfig, func: FuncT) -> Option<SummaryT>
where
    SummaryT: std::fmt::Display,
    FuncT: FnOnce() -> anyhow::Result<SummaryT>,
{
    let default_level = match output.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if output.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    match func() {
        Ok(summary) => {
            if output.print_summary {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
