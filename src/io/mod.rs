//! Process-level plumbing: instance lock, signals, system events, fire journal.

pub mod journal; // Persisted record of fired events
pub mod lock; // Single-instance lock file
pub mod signals; // Unix signal handling
pub mod system_events; // Clock change and sleep/resume detection
