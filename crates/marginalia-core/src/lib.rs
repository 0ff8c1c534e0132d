//! Core Marginalia library (conversation tree, selection threads, config).

pub mod config;
pub mod core;
pub mod logging;
