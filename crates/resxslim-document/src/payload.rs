// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload locator — finds the exact byte range of a raw image inside a decoded
// entry value.
//
// Byte-array entries are the image. Object-graph envelopes are treated as an
// untyped byte buffer: the earliest image signature marks the start, and a
// format-native end marker (PNG IEND chunk, JPEG EOI, GIF trailer) marks the
// end. The envelope format itself is never parsed.

use resxslim_core::types::{FormatKind, ImageFormat};

use crate::signature::{self, find, rfind};

/// PNG signature plus the rest of its 8-byte file header.
const PNG_HEADER_LEN: usize = 8;
const PNG_END_CHUNK: &[u8] = b"IEND";
/// CRC that follows the IEND chunk type.
const PNG_CRC_LEN: usize = 4;
const JPEG_END_OF_IMAGE: &[u8] = &[0xFF, 0xD9];
const GIF_TRAILER: &[u8] = &[0x3B];
/// Typical size of the envelope epilogue after a nested byte array.
const ENVELOPE_EPILOGUE_ESTIMATE: usize = 11;

/// How the end of a located payload was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The payload is the whole value.
    Whole,
    /// A format-native end marker was found.
    Marker,
    /// No end marker; the payload runs to the end of the buffer.
    EndOfBuffer,
    /// Format unknown; the trailing epilogue length was guessed.
    Estimated,
}

impl Boundary {
    /// Whether the end of the payload rests on something other than a guess.
    pub fn is_confident(&self) -> bool {
        matches!(self, Self::Whole | Self::Marker)
    }
}

/// An image located inside a decoded entry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedPayload<'a> {
    /// The raw image bytes.
    pub image_bytes: &'a [u8],
    /// Position of `image_bytes` within the decoded value.
    pub envelope_offset: usize,
    /// Length of `image_bytes`.
    pub envelope_length: usize,
    /// Format whose signature opens the payload, if recognised.
    pub format: Option<ImageFormat>,
    pub boundary: Boundary,
}

/// `(offset, length)` of the image inside `bytes`, or `None` when no image
/// can be located.
pub fn locate(bytes: &[u8], kind: FormatKind) -> Option<(usize, usize)> {
    extract(bytes, kind).map(|payload| (payload.envelope_offset, payload.envelope_length))
}

/// Locate the image inside `bytes` and borrow it.
pub fn extract(bytes: &[u8], kind: FormatKind) -> Option<EmbeddedPayload<'_>> {
    match kind {
        FormatKind::NotAnImage => None,
        FormatKind::ByteArrayImage => {
            if bytes.is_empty() {
                return None;
            }
            Some(EmbeddedPayload {
                image_bytes: bytes,
                envelope_offset: 0,
                envelope_length: bytes.len(),
                format: signature::detect_image_format(bytes),
                boundary: Boundary::Whole,
            })
        }
        FormatKind::ObjectGraphImage => {
            let (offset, _) = signature::first_signature(bytes)?;
            let format = signature::format_at(bytes, offset);
            let (length, boundary) = payload_length(bytes, offset, format);
            Some(EmbeddedPayload {
                image_bytes: &bytes[offset..offset + length],
                envelope_offset: offset,
                envelope_length: length,
                format,
                boundary,
            })
        }
    }
}

/// Length of the image starting at `offset`, measured with the end-of-stream
/// rule for `format`. Never exceeds the bytes remaining after `offset`.
pub fn payload_length(bytes: &[u8], offset: usize, format: Option<ImageFormat>) -> (usize, Boundary) {
    let remaining = bytes.len().saturating_sub(offset);
    let image = &bytes[offset.min(bytes.len())..];

    let marker_end = match format {
        Some(ImageFormat::Png) => png_end(image),
        Some(ImageFormat::Jpeg) => trailing_marker_end(image, ImageFormat::Jpeg, JPEG_END_OF_IMAGE),
        Some(ImageFormat::Gif) => trailing_marker_end(image, ImageFormat::Gif, GIF_TRAILER),
        None => {
            return (
                remaining.saturating_sub(ENVELOPE_EPILOGUE_ESTIMATE),
                Boundary::Estimated,
            );
        }
    };

    match marker_end {
        Some(end) if end <= remaining => (end, Boundary::Marker),
        _ => (remaining, Boundary::EndOfBuffer),
    }
}

/// End of a PNG stream: the IEND chunk type plus its CRC. The search starts
/// after the file header so the signature itself is never mistaken for data.
fn png_end(image: &[u8]) -> Option<usize> {
    let body = image.get(PNG_HEADER_LEN..)?;
    find(body, PNG_END_CHUNK).map(|pos| PNG_HEADER_LEN + pos + PNG_END_CHUNK.len() + PNG_CRC_LEN)
}

/// End of a stream whose terminator is found by scanning backward from the
/// end of the buffer, never reaching back into the signature.
fn trailing_marker_end(image: &[u8], format: ImageFormat, marker: &[u8]) -> Option<usize> {
    let skip = format.signature().len();
    let body = image.get(skip..)?;
    rfind(body, marker).map(|pos| skip + pos + marker.len())
}
