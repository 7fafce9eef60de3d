//! Shared utilities for the stand-up relay workspace.

pub mod logger;
