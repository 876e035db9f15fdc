//! # Parser
//!
//! Parses `.env` files into ordered key/value maps.
//!
//! The format is deliberately permissive: blank lines and `#` comments are skipped,
//! each remaining line is split on its first `=`, and anything else is ignored.
//! No quoting, escaping, `export` prefixes, or variable expansion are interpreted.

pub mod parsers;
pub mod types;

// Re-export public API
pub use parsers::{parse_env_content, read_env_file};
pub use types::EnvMap;
