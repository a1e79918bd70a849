//! Core types and utilities shared by the grass system and the demo

pub mod types;
pub mod error;
pub mod logging;
pub mod time;
pub mod camera;
pub mod input;
pub mod camera_controller;

pub use types::*;
pub use error::Error;
