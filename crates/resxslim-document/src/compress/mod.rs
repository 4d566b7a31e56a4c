// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression adapter — moves isolated image bytes through a transient file,
// an external compressor, and back into memory.

pub mod command;

use std::path::{Path, PathBuf};

use resxslim_core::error::Result;
use resxslim_core::types::{CompressionMode, CompressionResult};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::signature;

pub use command::CommandCompressor;

/// The external compressor contract.
///
/// Implementations dispatch on the file extension of `path`. Only
/// `result_size` and the existence of `result_path` are trusted by callers.
pub trait ImageCompressor: Send + Sync {
    fn compress_file(&self, path: &Path, mode: CompressionMode) -> Result<CompressionResult>;
}

/// Runs one image at a time through an [`ImageCompressor`].
pub struct CompressionAdapter<'a> {
    compressor: &'a dyn ImageCompressor,
    temp_dir: PathBuf,
    verify_output_format: bool,
}

impl<'a> CompressionAdapter<'a> {
    pub fn new(compressor: &'a dyn ImageCompressor, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            compressor,
            temp_dir: temp_dir.into(),
            verify_output_format: true,
        }
    }

    /// Whether compressor output must keep the input's image format.
    pub fn verify_output_format(mut self, enabled: bool) -> Self {
        self.verify_output_format = enabled;
        self
    }

    /// Compress `image_bytes`, returning the smaller encoding or `None` when
    /// nothing was gained. Transient files are removed before returning.
    #[instrument(skip(self, image_bytes), fields(len = image_bytes.len()))]
    pub fn compress(
        &self,
        image_bytes: &[u8],
        extension: &str,
        mode: CompressionMode,
    ) -> Option<Vec<u8>> {
        let input = self
            .temp_dir
            .join(format!("resxslim-{}.{}", Uuid::new_v4().simple(), extension));
        let mut transient = TransientFiles::default();
        transient.track(&input);

        if let Err(err) = std::fs::write(&input, image_bytes) {
            warn!(path = %input.display(), error = %err, "failed to write transient image");
            return None;
        }

        let outcome = match self.compressor.compress_file(&input, mode) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(error = %err, "compressor reported failure");
                return None;
            }
        };

        let result_path = outcome.result_path?;
        transient.track(&result_path);

        let original_size = image_bytes.len() as u64;
        if outcome.result_size == 0 || outcome.result_size >= original_size {
            debug!(result_size = outcome.result_size, original_size, "no size reduction");
            return None;
        }
        if !result_path.is_file() {
            debug!(path = %result_path.display(), "compressor produced no output file");
            return None;
        }

        let optimized = match std::fs::read(&result_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %result_path.display(), error = %err, "compressed output unreadable");
                return None;
            }
        };

        if optimized.is_empty() || optimized.len() >= image_bytes.len() {
            debug!(read = optimized.len(), "output on disk is not smaller");
            return None;
        }
        if self.verify_output_format && !same_format(image_bytes, &optimized) {
            warn!("compressor changed the image format; discarding output");
            return None;
        }

        debug!(from = image_bytes.len(), to = optimized.len(), "image compressed");
        Some(optimized)
    }
}

/// Whether `before` and `after` carry the same image format.
fn same_format(before: &[u8], after: &[u8]) -> bool {
    match (image::guess_format(before), image::guess_format(after)) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), _) => {
            let expected = signature::detect_image_format(before);
            expected.is_some() && expected == signature::detect_image_format(after)
        }
        (Ok(_), Err(_)) => false,
    }
}

/// Files removed, best effort, when the guard drops.
#[derive(Default)]
struct TransientFiles {
    paths: Vec<PathBuf>,
}

impl TransientFiles {
    fn track(&mut self, path: &Path) {
        if !self.paths.iter().any(|known| known == path) {
            self.paths.push(path.to_path_buf());
        }
    }
}

impl Drop for TransientFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove transient file");
                }
            }
        }
    }
}
