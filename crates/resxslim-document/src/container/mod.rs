// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Container module — loading .resx documents, splicing rewritten envelopes,
// and the per-container optimisation pass.

pub mod document;
pub mod envelope;
pub mod rewriter;

pub use document::{DataEntry, ResxDocument};
pub use rewriter::{ContainerRewriter, optimize};
