// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{Options, OptionsFile};
use crate::errors::BuildError;

/// Load an option overlay from a TOML file.
///
/// This only deserializes; semantic validation happens when the overlay is
/// applied and again in [`crate::config::validate_options`] at run entry.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<OptionsFile, BuildError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|err| {
        BuildError::Config(format!("reading options file at {}: {err}", path.display()))
    })?;

    let overlay: OptionsFile = toml::from_str(&contents).map_err(|err| {
        BuildError::Config(format!("parsing TOML options from {}: {err}", path.display()))
    })?;

    debug!(path = %path.display(), "loaded options overlay");
    Ok(overlay)
}

/// Apply an overlay on top of in-code options.
///
/// Only the fields present in the file change; level names are parsed here
/// so a typo fails early with a `Config` error.
pub fn apply_overlay(mut options: Options, overlay: OptionsFile) -> Result<Options, BuildError> {
    if let Some(threads) = overlay.build.threads {
        options.threads = threads;
    }
    if let Some(fail_on_error) = overlay.build.fail_on_error {
        options.fail_on_error = fail_on_error;
    }
    if let Some(project_root) = overlay.build.project_root {
        options.project_root = project_root;
    }

    if let Some(console) = overlay.log.console {
        options.console_level = console
            .parse()
            .map_err(|err: String| BuildError::Config(format!("[log].console: {err}")))?;
    }
    if let Some(file) = overlay.log.file {
        options.file_level = file
            .parse()
            .map_err(|err: String| BuildError::Config(format!("[log].file: {err}")))?;
    }
    if let Some(path) = overlay.log.path {
        options.file_log_path = Some(path);
    }

    if !overlay.want.is_empty() {
        options.want = overlay.want;
    }

    Ok(options)
}

/// Convenience: load a TOML overlay and apply it in one step.
pub fn load_and_apply(
    options: Options,
    path: impl AsRef<Path>,
) -> Result<Options, BuildError> {
    let overlay = load_from_path(path)?;
    apply_overlay(options, overlay)
}
