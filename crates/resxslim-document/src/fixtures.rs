// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic image streams and envelopes shared by the unit tests. The filler
// bytes never form a signature or an end marker.

/// A PNG-shaped stream of exactly `len` bytes ending in IEND + CRC.
pub(crate) fn png(len: usize) -> Vec<u8> {
    assert!(len >= 16, "png fixture needs room for header and IEND");
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len - 8, 0x11);
    bytes.extend_from_slice(b"IEND");
    bytes.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    bytes
}

/// A JPEG-shaped stream of exactly `len` bytes ending in EOI.
pub(crate) fn jpeg(len: usize) -> Vec<u8> {
    assert!(len >= 6, "jpeg fixture needs room for SOI and EOI");
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len - 2, 0x22);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// A GIF-shaped stream of exactly `len` bytes ending in the trailer byte.
pub(crate) fn gif(len: usize) -> Vec<u8> {
    assert!(len >= 7, "gif fixture needs room for header and trailer");
    let mut bytes = b"GIF89a".to_vec();
    bytes.resize(len - 1, 0x33);
    bytes.push(0x3B);
    bytes
}

/// `[header_len filler bytes][u32 LE image length][image][trailer]`.
pub(crate) fn envelope(header_len: usize, image: &[u8], trailer: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x01; header_len];
    bytes.extend_from_slice(&(image.len() as u32).to_le_bytes());
    bytes.extend_from_slice(image);
    bytes.extend_from_slice(trailer);
    bytes
}
