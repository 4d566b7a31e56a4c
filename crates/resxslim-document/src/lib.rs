// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// resxslim-document — Embedded-image extraction and reassembly for .resx
// resource containers.
//
// Classifies container entries by metadata and signature bytes, isolates the
// exact image byte range inside opaque serialized blobs, hands those bytes to
// an external compressor, and splices the result back without disturbing any
// byte outside the image region.

pub mod compress;
pub mod container;
pub mod integrity;
pub mod payload;
pub mod signature;

#[cfg(test)]
mod fixtures;

// Re-export the primary entry points so callers can use `resxslim_document::optimize` etc.
pub use compress::{CommandCompressor, CompressionAdapter, ImageCompressor};
pub use container::document::ResxDocument;
pub use container::rewriter::{ContainerRewriter, optimize};
pub use payload::{Boundary, EmbeddedPayload};
