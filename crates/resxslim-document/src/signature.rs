// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signature scanner — byte-pattern matching for PNG/JPEG/GIF magic numbers and
// metadata-based classification of container entries.

use resxslim_core::types::{FormatKind, ImageFormat};

/// Mimetype of entries that store raw bytes as base64.
pub const BYTE_ARRAY_MIMETYPE: &str = "application/x-microsoft.net.object.bytearray.base64";

/// Mimetype of entries that store a legacy object-graph envelope as base64.
pub const OBJECT_GRAPH_MIMETYPE: &str = "application/x-microsoft.net.object.binary.base64";

/// Substrings of `type` attributes that name image classes.
pub const IMAGE_TYPE_MARKERS: [&str; 3] = ["Bitmap", "Icon", "Image"];

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Position of the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// True when `bytes` contains any known image signature anywhere.
pub fn probe(bytes: &[u8]) -> bool {
    ImageFormat::ALL
        .iter()
        .any(|format| find(bytes, format.signature()).is_some())
}

/// Earliest signature match in `bytes`, with the format it belongs to.
pub fn first_signature(bytes: &[u8]) -> Option<(usize, ImageFormat)> {
    ImageFormat::ALL
        .iter()
        .filter_map(|format| find(bytes, format.signature()).map(|pos| (pos, *format)))
        .min_by_key(|(pos, _)| *pos)
}

/// Format whose signature starts exactly at `offset`.
pub fn format_at(bytes: &[u8], offset: usize) -> Option<ImageFormat> {
    let tail = bytes.get(offset..)?;
    detect_image_format(tail)
}

/// Format whose signature opens `bytes`.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    ImageFormat::ALL
        .into_iter()
        .find(|format| bytes.starts_with(format.signature()))
}

/// Extension an external compressor should see for `bytes`, derived only from
/// the leading magic bytes.
pub fn detect_image_extension(bytes: &[u8]) -> Option<&'static str> {
    detect_image_format(bytes).map(|format| format.extension())
}

/// Classify an entry from its declared metadata alone.
///
/// `ObjectGraphImage` is provisional: the caller must [`confirm`] it against
/// the decoded bytes before treating the entry as an image.
pub fn classify(declared_type: Option<&str>, declared_mimetype: Option<&str>) -> FormatKind {
    let Some(mimetype) = declared_mimetype.map(str::trim) else {
        return FormatKind::NotAnImage;
    };

    if mimetype.eq_ignore_ascii_case(BYTE_ARRAY_MIMETYPE) {
        let is_image_type = declared_type
            .is_some_and(|ty| IMAGE_TYPE_MARKERS.iter().any(|marker| ty.contains(marker)));
        if is_image_type {
            FormatKind::ByteArrayImage
        } else {
            FormatKind::NotAnImage
        }
    } else if mimetype.eq_ignore_ascii_case(OBJECT_GRAPH_MIMETYPE) {
        FormatKind::ObjectGraphImage
    } else {
        FormatKind::NotAnImage
    }
}

/// Settle a provisional classification against the decoded bytes. `None`
/// stands for a value that failed to decode.
pub fn confirm(kind: FormatKind, decoded: Option<&[u8]>) -> FormatKind {
    match kind {
        FormatKind::ObjectGraphImage if decoded.is_some_and(probe) => kind,
        FormatKind::ObjectGraphImage => FormatKind::NotAnImage,
        other => other,
    }
}
