// src/watch/mod.rs

//! File watching and change-to-trigger mapping.
//!
//! This module is responsible for:
//! - compiling per-stage watch/exclude globs and the reload-only patterns
//! - wiring up a cross-platform filesystem watcher (`notify`)
//! - debouncing bursts of change events per path before triggering
//!
//! It does **not** know about stage dependencies or run state; it only turns
//! filesystem changes into stage-level triggers (or reload hits) for the
//! runtime.

pub mod debouncer;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debouncer::Debouncer;
pub use patterns::{build_watch_profiles, StageWatchProfile, WatchProfiles};
pub use watcher::{spawn_watcher, WatcherHandle};
