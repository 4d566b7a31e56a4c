// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Container fingerprints — SHA-256 hashing to detect a container changing on
// disk between load and save.

use std::path::Path;

use resxslim_core::error::{ResxSlimError, Result};
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that the file at `path` still matches the expected SHA-256 hex digest.
///
/// Returns `Err(ResxSlimError::IntegrityMismatch)` with the expected and
/// actual values when it does not.
pub fn verify_file(path: &Path, expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(&std::fs::read(path)?);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(ResxSlimError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
