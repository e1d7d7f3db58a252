//! Terminal display utilities for the CLI.
//!
//! Provides progress bars for the build and tables for query results.

pub mod progress;
pub mod tables;

pub use progress::{create_progress_bar, create_spinner};
pub use tables::{TableBuilder, create_build_summary_table, create_matches_table};
