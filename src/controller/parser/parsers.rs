//! # Parsers
//!
//! Parse `.env` files fetched from the source repository.

use crate::controller::parser::types::EnvMap;
use crate::controller::reconciler::types::ReconcilerError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Parse `.env` content into an ordered map
///
/// Rules:
/// - lines end at `\n`, `\r\n` or a bare `\r`
/// - lines are trimmed; empty lines and lines starting with `#` are skipped
/// - a line is split on its first `=` only; key and value are trimmed
/// - lines without `=` are ignored
/// - a repeated key overwrites the earlier value
///
/// Parsing never fails: malformed lines simply contribute nothing.
#[must_use]
pub fn parse_env_content(content: &str) -> EnvMap {
    let mut env = EnvMap::new();

    for line in content.split(['\r', '\n']) {
        let line = line.trim();

        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Parse KEY=VALUE format
        if let Some((key, value)) = line.split_once('=') {
            env.insert(key.trim(), value.trim());
        }
    }

    env
}

/// Read and parse an `.env` file from a checked-out tree
///
/// A missing file, a directory, or non-UTF-8 content will not fix itself on retry
/// and is reported as permanent. Other I/O failures are transient.
pub async fn read_env_file(path: &Path, display_path: &str) -> Result<EnvMap, ReconcilerError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => return Err(classify_read_error(&e, display_path)),
    };

    let env = parse_env_content(&content);
    debug!(
        file.path = display_path,
        entries = env.len(),
        "Parsed env file"
    );
    Ok(env)
}

fn classify_read_error(e: &std::io::Error, display_path: &str) -> ReconcilerError {
    match e.kind() {
        ErrorKind::NotFound => ReconcilerError::Permanent(format!(
            "env file '{display_path}' does not exist in the repository"
        )),
        ErrorKind::InvalidData | ErrorKind::IsADirectory => ReconcilerError::Permanent(format!(
            "env file '{display_path}' is not a readable UTF-8 text file: {e}"
        )),
        _ => ReconcilerError::Transient(format!("failed to read env file '{display_path}': {e}")),
    }
}
