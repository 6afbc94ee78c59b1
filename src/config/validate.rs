// src/config/validate.rs

use crate::config::model::Options;
use crate::errors::BuildError;

/// Run basic semantic validation against assembled options.
///
/// This checks:
/// - `threads >= 1` (a zero worker budget can never make progress)
/// - want entries are non-empty names
///
/// It does **not** check that `project_root` exists; rules may legitimately
/// create it.
pub fn validate_options(options: &Options) -> Result<(), BuildError> {
    if options.threads == 0 {
        return Err(BuildError::Config(
            "threads must be >= 1 (got 0)".to_string(),
        ));
    }

    for name in &options.want {
        if name.is_empty() {
            return Err(BuildError::Config(
                "want list contains an empty target name".to_string(),
            ));
        }
    }

    Ok(())
}
