//! # framecast-client: screen streaming client
//!
//! Streams the selected display to a listener using `framecast-core`,
//! and keeps the target address and display selection in a TOML file.
//!
//! ## Commands
//!
//! - **stream**: connect and stream until Ctrl-C or the first failure.
//! - **connect**: validate and save a `host[:port]` target.
//! - **displays** / **select-display**: inspect and pick the display.
//! - **listen**: reference receiver that decodes and stores frames.

pub mod config;
pub mod listener;
pub mod service;
