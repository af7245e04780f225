//! osconfig CLI library: argument definitions and command handlers.

pub mod commands;
pub mod output;
