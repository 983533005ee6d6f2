// src/config/mod.rs

//! Configuration loading.
//!
//! - [`model`] holds the raw TOML mapping and the validated [`Config`].
//! - [`validate`] turns a raw file into a `Config` (defaults + checks).
//! - [`loader`] reads files from disk.
//! - [`duration`] parses `"15s"`-style duration strings.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AdmissionSettings, Config, HookSettings, LoopSettings, RawConfigFile, SourceSettings,
    WatchdogSettings, WorkerSettings,
};
