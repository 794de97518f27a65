// Handlers for the `plaques` subcommands. main.rs parses and dispatches.

pub mod query;
pub mod serve;
