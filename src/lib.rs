//! Muxforge - container conversion for media libraries
//!
//! This library crate exposes the conversion core for the binary and for
//! integration testing.

pub mod batch;
pub mod config;
pub mod error;
pub mod fsops;
pub mod planner;
pub mod processor;
pub mod relocate;

pub use error::{Error, Result};
pub use processor::{ConversionResult, Converter, Disposition};
