use std::{path::PathBuf, sync::OnceLock};

/// Outcome of the one and only attempt to read the `.env` file
static ENV_LOADED: OnceLock<Result<PathBuf, String>> = OnceLock::new();

/// Loads environment variables from a `.env` file if they haven't been loaded yet.
///
/// Variables already present in the process environment win over the file.
/// A missing or unreadable file is not fatal: the error is returned so the
/// caller can warn about it once logging is up, and the run carries on with
/// whatever is already set.
pub fn load_env() -> &'static Result<PathBuf, String> {
    ENV_LOADED.get_or_init(|| dotenvy::dotenv().map_err(|e| e.to_string()))
}

/// Report the `.env` outcome through tracing
pub fn report_env(outcome: &Result<PathBuf, String>) {
    match outcome {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded env file"),
        Err(e) => tracing::warn!("Failed to load env file: {}", e),
    }
}
