//! dockwire CLI library
//!
//! Argument parsing lives in [`cli`], command handlers in [`commands`],
//! and config layering (file, environment, flags) in [`config`].

pub mod cli;
pub mod commands;
pub mod config;
