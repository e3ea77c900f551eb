//! Secret reference resolver.
//!
//! Credential and key values in `config.toml` may point at a secret kept
//! elsewhere instead of holding it inline:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used verbatim

use thiserror::Error;

/// Failure to resolve a secret reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// `pass` could not be run or exited unsuccessfully.
    #[error("`pass show {path}` failed: {reason}")]
    Pass {
        /// Store path that was requested.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The referenced environment variable is unset or not unicode.
    #[error("environment variable `{0}` is not set")]
    EnvMissing(String),
}

/// Resolves a value that may carry a `pass::` or `env::` prefix.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var).map_err(|_| SecretError::EnvMissing(var.to_string()))
    } else {
        Ok(value.to_string())
    }
}

/// Resolves an optional value, treating an empty result as absent.
pub fn resolve_opt(value: Option<&str>) -> Result<Option<String>, SecretError> {
    match value {
        Some(raw) => Ok(Some(resolve(raw)?).filter(|v| !v.is_empty())),
        None => Ok(None),
    }
}

fn resolve_pass(path: &str) -> Result<String, SecretError> {
    let failed = |reason: String| SecretError::Pass {
        path: path.to_string(),
        reason,
    };

    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("exit {}: {}", output.status, stderr.trim())));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| failed("no output".to_string()))
}
