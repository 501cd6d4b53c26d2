//! Wayfinder CLI library.
//!
//! Argument types, subcommand handlers, output rendering and logging setup
//! for the `wayfinder` binary.

pub mod commands;
pub mod logging;
pub mod output;
