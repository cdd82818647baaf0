//! CLI module
//!
//! Command-line interface for driving a session by hand.
//!
//! # Commands
//!
//! - `login` - Restore or establish a session and store its cookies
//! - `restore` - Check whether the stored session is still usable
//! - `logout` - Delete the stored session
//! - `get` - Issue one authorized GET
//! - `collect` - Fetch a paged collection

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{Runner, PASSWORD_ENV};
