//! # Vakit Library
//!
//! Internal library for the `vakitd` prayer-time daemon.
//!
//! This library exists to enable testing of the calculator, calendar and
//! trigger engine, and to keep CLI dispatch (main.rs) separate from
//! application logic.
//!
//! ## Architecture
//!
//! - **Calculator**: `geo` turns a location and calculation settings into
//!   [`geo::DailyTimes`] for a civil date
//! - **Calendar**: `calendar` expands a day's times into timed adhan and
//!   pre-alert events
//! - **Engine**: `engine` owns the calendar and fires each event exactly once
//!   across restarts, clock jumps, day rollovers and settings changes
//! - **Ports**: `backend` with the audio player and notifier the engine drives
//! - **Configuration**: `config` for TOML settings with hot reload
//! - **Commands**: `commands` for the one-shot CLI commands (`times`, `simulate`)
//! - **Infrastructure**: `io` for the lock file, fire journal, signals and
//!   system event monitors; `time` for the real and simulated clocks
//! - **Entry Point**: [`daemon::Vakitd`] wires everything together for `vakitd run`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod backend;
pub mod calendar;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod geo;
pub mod io;
pub mod prayer;
pub mod time;

pub use daemon::Vakitd;
