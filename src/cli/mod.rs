//! CLI command implementations

pub mod args;
pub mod error;
pub mod run;

pub use args::{Cli, OutputFormat, RunRequest};
pub use error::CliError;
pub use run::{print_result, Pipeline, RunResult};
