//! # Error Handling
//!
//! Centralized error type for `build-grid`, built with `thiserror`. Each
//! variant corresponds to one failure family: board selection, commit-range
//! resolution, toolchain lookup, git command execution, override parsing,
//! native-build invocation, and the wrapped I/O / serde errors.
//!
//! The `Result<T>` alias is used throughout the library; the binary layer
//! converts into `anyhow::Error` at the command boundary.

use thiserror::Error;

/// Main error type for build-grid operations
#[derive(Error, Debug)]
pub enum Error {
    /// The board filter produced an empty final selection.
    #[error("No matching boards found: {message}")]
    Selection { message: String },

    /// The board descriptor table could not be loaded or regenerated.
    #[error("Board table error for {path}: {message}")]
    BoardTable { path: String, message: String },

    /// The resolved commit range was empty or had no usable upstream.
    ///
    /// Includes a hint because the usual fix (set an upstream or pass an
    /// explicit count) is not obvious from the raw git output.
    #[error("Commit range error for '{branch}': {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Range {
        branch: String,
        message: String,
        hint: Option<String>,
    },

    /// A duplicate commit trailer tag was seen with overwriting disabled.
    #[error("Duplicate commit tag '{tag}': {message}")]
    DuplicateTag { tag: String, message: String },

    /// The selected boards span more than one toolchain when a single
    /// prefix was requested.
    #[error("Ambiguous toolchain: boards span {count} toolchains ({prefixes})")]
    AmbiguousToolchain { count: usize, prefixes: String },

    /// No toolchain is known for an architecture.
    #[error("No toolchain found for architecture '{arch}'")]
    ToolchainMissing { arch: String },

    /// An error occurred while executing a git command.
    #[error("Git command failed: git {command} - {stderr}")]
    Git { command: String, stderr: String },

    /// A raw configuration-override token could not be parsed.
    #[error("Invalid override token '{token}': {message}")]
    Overrides { token: String, message: String },

    /// The native build tool could not be located or invoked.
    #[error("Build tool error: {message}")]
    Build { message: String },

    /// `--work-in-output` was combined with more than one board or commit.
    #[error("work-in-output requires exactly one board and one commit: {message}")]
    WorkInOutput { message: String },

    /// A persisted job record was missing or unreadable in summary mode.
    #[error("Result record error for {path}: {message}")]
    Record { path: String, message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
