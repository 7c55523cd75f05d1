//! Command-line front end
//!
//! Command handlers live in [`commands`]; the binary in `main.rs` only parses
//! arguments and sets up logging.

pub mod commands;
pub mod error;
