//! Command-line surface for the `jobacct` binary.
//!
//! `parse` holds the clap types, `route` runs commands against the facade and
//! `presentation` renders results as text tables or JSON.

pub mod parse;
pub mod presentation;
pub mod route;

pub use parse::{Cli, Commands};
pub use route::RunContext;
