// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for resxslim.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all resxslim operations.
#[derive(Debug, Error)]
pub enum ResxSlimError {
    // -- Argument errors --
    #[error("invalid container path: {0}")]
    InvalidPath(String),

    // -- Container errors --
    #[error("malformed container {path}: {detail}")]
    MalformedContainer { path: String, detail: String },

    #[error("container changed on disk: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Per-entry degradations --
    #[error("invalid base64 value: {0}")]
    InvalidBase64(String),

    #[error("length prefix mismatch: expected {expected}, found {found:?}")]
    LengthPrefixMismatch { expected: u32, found: Option<u32> },

    #[error("payload {offset}+{length} lies outside a {available}-byte value")]
    PayloadOutOfBounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    // -- Compressor errors --
    #[error("compressor failed: {0}")]
    Compressor(String),

    #[error("compressor timed out after {0:?}")]
    CompressorTimeout(Duration),

    #[error("no compressor configured for .{0} files")]
    NoCompressorForExtension(String),

    // -- Ambient --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResxSlimError>;
