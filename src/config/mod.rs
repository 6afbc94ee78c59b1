// src/config/mod.rs

//! Engine options and their optional TOML overlay.
//!
//! Responsibilities:
//! - Define the options record and the overlay data model (`model.rs`).
//! - Load an overlay file from disk and fold it in (`loader.rs`).
//! - Validate basic invariants like a positive worker budget (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_overlay, load_and_apply, load_from_path};
pub use model::{BuildSection, LogSection, Options, OptionsFile};
pub use validate::validate_options;
