//! Plaques CLI library.
//!
//! Argument parsing helpers and output rendering shared by the `plaques`
//! binary's subcommands.

pub mod args;
pub mod output;
