//! Cross-platform utilities for file operations and platform detection.

pub mod fs;
pub mod platform;
