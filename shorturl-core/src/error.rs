// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shorturl.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`
//! in library code - every failure a caller can see is a typed variant.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the store, the record log and the cache proxy.
#[derive(Debug, Error)]
pub enum StoreError {
    // =========================================================================
    // Mapping Errors
    // =========================================================================
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Raised by accept-if-absent inserts. `put` always retries on it, so it
    /// never leaves the store.
    #[error("Key already assigned: {key}")]
    KeyCollision { key: String },

    // =========================================================================
    // Durability Errors
    // =========================================================================
    #[error("Record log error: {0}")]
    Journal(#[from] JournalError),

    // =========================================================================
    // Proxy Errors - No Local Fallback
    // =========================================================================
    #[error("Remote store unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Shorthand for a missing key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Shorthand for a failed or timed out remote call.
    pub fn remote(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            reason: reason.into(),
        }
    }

    /// True for errors that mean "no such key" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

/// Record log errors.
///
/// Write failures are logged by the append loop and never reach `put`.
/// Load failures abort startup: serving without a consistent base state is unsafe.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to append record for key {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replay record log {path} at line {line}: {reason}")]
    LoadFailed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to open record log {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record log writer has shut down")]
    Closed,
}

/// Configuration errors prevent startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
