// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for resxslim.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a container entry stores its value, as far as image optimisation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Raw image bytes stored directly as base64.
    ByteArrayImage,
    /// Image bytes nested inside a legacy object-graph envelope.
    ObjectGraphImage,
    /// Anything else. Skipped and never reported.
    NotAnImage,
}

impl FormatKind {
    pub fn is_image(&self) -> bool {
        !matches!(self, Self::NotAnImage)
    }
}

/// Raster formats recognised by their leading signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// All recognised formats, in signature-table order.
    pub const ALL: [ImageFormat; 3] = [Self::Png, Self::Jpeg, Self::Gif];

    /// Magic bytes that open a stream of this format.
    pub fn signature(&self) -> &'static [u8] {
        match self {
            Self::Png => &[0x89, 0x50, 0x4E, 0x47],
            Self::Jpeg => &[0xFF, 0xD8, 0xFF],
            Self::Gif => &[0x47, 0x49, 0x46],
        }
    }

    /// File extension external compressors dispatch on.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
        }
    }
}

/// Compression aggressiveness requested from the external compressor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMode {
    #[default]
    Lossless,
    Lossy,
}

/// What an external compressor reports after processing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    /// Size of the input file in bytes.
    pub original_size: u64,
    /// Size of the produced file in bytes.
    pub result_size: u64,
    /// Where the compressed file was written, if anywhere.
    pub result_path: Option<PathBuf>,
}

impl CompressionResult {
    /// True when the compressor claims an output strictly smaller than its input.
    pub fn is_reduction(&self) -> bool {
        self.result_size > 0 && self.result_size < self.original_size
    }
}

/// Outcome of optimising one image entry of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResult {
    pub resource_name: String,
    pub container_path: PathBuf,
    /// Decoded size of the entry's original value.
    pub original_size: u64,
    /// Decoded size of `optimized_value`, or `original_size` when untouched.
    pub optimized_size: u64,
    /// New base64 value text. `None` means the entry was left untouched.
    pub optimized_value: Option<String>,
}

impl EntryResult {
    /// An entry that was examined but not improved.
    pub fn zero(
        resource_name: impl Into<String>,
        container_path: impl Into<PathBuf>,
        original_size: u64,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            container_path: container_path.into(),
            original_size,
            optimized_size: original_size,
            optimized_value: None,
        }
    }

    /// An entry whose value was rewritten with a smaller encoding.
    pub fn improved(
        resource_name: impl Into<String>,
        container_path: impl Into<PathBuf>,
        original_size: u64,
        optimized_size: u64,
        optimized_value: String,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            container_path: container_path.into(),
            original_size,
            optimized_size,
            optimized_value: Some(optimized_value),
        }
    }

    pub fn is_improved(&self) -> bool {
        self.optimized_value.is_some()
    }

    /// Bytes saved. Zero when no value was produced.
    pub fn saving(&self) -> u64 {
        match self.optimized_value {
            Some(_) => self.original_size.saturating_sub(self.optimized_size),
            None => 0,
        }
    }
}
