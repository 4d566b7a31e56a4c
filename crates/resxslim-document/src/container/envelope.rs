// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Envelope reassembly — splices a compressed image back into an object-graph
// envelope and patches the little-endian length prefix in front of it.

use resxslim_core::config::LengthPrefixPolicy;
use resxslim_core::error::{ResxSlimError, Result};
use tracing::warn;

/// Width of the length field that precedes a nested byte array.
const LENGTH_PREFIX_LEN: usize = 4;

/// What was found in front of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// The field held the payload length and was rewritten.
    Patched,
    /// The field did not hold the payload length (or there was no room for one).
    Unconfirmed { found: Option<u32> },
}

/// Rewrite the four bytes before `header.len()` from `old_len` to `new_len`
/// when they currently encode `old_len`.
pub fn patch_length_prefix(header: &mut [u8], old_len: usize, new_len: usize) -> LengthPrefix {
    let Some(field_start) = header.len().checked_sub(LENGTH_PREFIX_LEN) else {
        return LengthPrefix::Unconfirmed { found: None };
    };
    let field = &mut header[field_start..];
    let mut raw = [0u8; LENGTH_PREFIX_LEN];
    raw.copy_from_slice(field);
    let found = u32::from_le_bytes(raw);

    match (u32::try_from(old_len), u32::try_from(new_len)) {
        (Ok(old), Ok(new)) if found == old => {
            field.copy_from_slice(&new.to_le_bytes());
            LengthPrefix::Patched
        }
        _ => LengthPrefix::Unconfirmed { found: Some(found) },
    }
}

/// `value[..offset] + optimized + value[offset + length..]`, with the length
/// prefix patched when one is confirmed.
///
/// An unconfirmed prefix is left untouched under `Preserve`, and fails the
/// entry under `Reject`. A range reaching past the end of `value` is an error.
pub fn reassemble(
    value: &[u8],
    offset: usize,
    length: usize,
    optimized: &[u8],
    policy: LengthPrefixPolicy,
) -> Result<Vec<u8>> {
    let (Some(header), Some(trailer)) = (
        value.get(..offset),
        offset.checked_add(length).and_then(|end| value.get(end..)),
    ) else {
        return Err(ResxSlimError::PayloadOutOfBounds {
            offset,
            length,
            available: value.len(),
        });
    };
    let mut header = header.to_vec();

    if let LengthPrefix::Unconfirmed { found } = patch_length_prefix(&mut header, length, optimized.len()) {
        let expected = u32::try_from(length).unwrap_or(u32::MAX);
        match policy {
            LengthPrefixPolicy::Preserve => {
                warn!(expected, ?found, "length prefix not confirmed; left unmodified");
            }
            LengthPrefixPolicy::Reject => {
                return Err(ResxSlimError::LengthPrefixMismatch { expected, found });
            }
        }
    }

    let mut rebuilt = Vec::with_capacity(header.len() + optimized.len() + trailer.len());
    rebuilt.extend_from_slice(&header);
    rebuilt.extend_from_slice(optimized);
    rebuilt.extend_from_slice(trailer);
    Ok(rebuilt)
}
