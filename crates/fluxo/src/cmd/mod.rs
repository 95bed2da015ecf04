//! CLI subcommands

pub mod serve;
