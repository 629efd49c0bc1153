#![doc = include_str!("../README.md")]

pub mod command;
pub mod config;
pub mod registry;
pub mod render;
pub mod stream;
pub mod telemetry;
pub mod watch;
