//! Shared infrastructure: logging macros, defaults and helpers.

// Declared first so the macros are visible to sibling modules
#[macro_use]
pub mod logger;

pub mod constants;
pub mod utils;
