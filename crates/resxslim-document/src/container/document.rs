// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// .resx document model — one `quick-xml` pass yields entry metadata and the
// byte range of every value, so edits splice into the original text and the
// container is saved once, atomically.

use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use resxslim_core::error::{ResxSlimError, Result};
use tracing::{debug, info, instrument};

use crate::integrity;
use crate::signature::rfind;

const BOM: char = '\u{feff}';

/// Depth of `data` elements: directly under the root.
const DATA_DEPTH: usize = 1;
/// Depth of `value` elements: directly under a `data` element.
const VALUE_DEPTH: usize = 2;

/// One `data` element of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    /// Position among the root's `data` children.
    pub index: usize,
    pub name: String,
    pub declared_type: Option<String>,
    pub declared_mimetype: Option<String>,
    /// Text of the first `value` child, if present.
    pub value: Option<String>,
    value_span: Option<Range<usize>>,
}

impl DataEntry {
    fn from_tag(index: usize, tag: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let mut entry = Self {
            index,
            name: String::new(),
            declared_type: None,
            declared_mimetype: None,
            value: None,
            value_span: None,
        };
        for attribute in tag.attributes() {
            let attribute = attribute.map_err(|err| err.to_string())?;
            let value = attribute
                .unescape_value()
                .map_err(|err| err.to_string())?
                .into_owned();
            match attribute.key.local_name().as_ref() {
                b"name" => entry.name = value,
                b"type" => entry.declared_type = Some(value),
                b"mimetype" => entry.declared_mimetype = Some(value),
                _ => {}
            }
        }
        Ok(entry)
    }
}

/// A `value` element whose end tag has not been seen yet.
struct OpenValue {
    content_start: usize,
    text: String,
}

/// A loaded container: the original text, kept verbatim, plus its entries.
#[derive(Debug)]
pub struct ResxDocument {
    path: PathBuf,
    text: String,
    fingerprint: String,
    entries: Vec<DataEntry>,
}

impl ResxDocument {
    /// Read and index the container at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|err| malformed(path, format!("not valid UTF-8: {err}")))?;
        let document = Self::from_text(path, text)?;
        debug!(entries = document.entries.len(), "container loaded");
        Ok(document)
    }

    /// Index container text that claims to live at `path`.
    pub fn from_text(path: impl Into<PathBuf>, text: String) -> Result<Self> {
        let path = path.into();
        let fingerprint = integrity::hash_bytes(text.as_bytes());
        let body_start = if text.starts_with(BOM) { BOM.len_utf8() } else { 0 };

        let mut entries =
            index_entries(&text[body_start..]).map_err(|detail| malformed(&path, detail))?;
        for span in entries.iter_mut().filter_map(|entry| entry.value_span.as_mut()) {
            *span = span.start + body_start..span.end + body_start;
        }

        Ok(Self {
            path,
            text,
            fingerprint,
            entries,
        })
    }

    pub fn entries(&self) -> &[DataEntry] {
        &self.entries
    }

    /// The container text with each `(entry_index, new_value)` edit applied.
    ///
    /// Only the non-whitespace core of each edited value is replaced, so the
    /// indentation around it survives. Every other byte is copied verbatim.
    pub fn render(&self, edits: &[(usize, String)]) -> Result<String> {
        let mut targets: Vec<(Range<usize>, &str)> = Vec::with_capacity(edits.len());
        for (index, new_value) in edits {
            let span = self
                .entries
                .get(*index)
                .and_then(|entry| entry.value_span.clone())
                .ok_or_else(|| {
                    malformed(&self.path, format!("entry {index} has no value to replace"))
                })?;
            targets.push((trim_span(&self.text, span), new_value.as_str()));
        }
        targets.sort_by_key(|(span, _)| span.start);
        if targets.windows(2).any(|pair| pair[0].0.end > pair[1].0.start) {
            return Err(malformed(&self.path, "overlapping value edits".into()));
        }

        let mut rendered = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (span, new_value) in targets {
            rendered.push_str(&self.text[cursor..span.start]);
            rendered.push_str(new_value);
            cursor = span.end;
        }
        rendered.push_str(&self.text[cursor..]);
        Ok(rendered)
    }

    /// Apply `edits` and write the result over the container, atomically.
    ///
    /// Fails with `IntegrityMismatch`, without writing, when the file on disk
    /// no longer matches what was loaded.
    #[instrument(skip_all, fields(path = %self.path.display(), edits = edits.len()))]
    pub fn save_with(&self, edits: &[(usize, String)]) -> Result<()> {
        let rendered = self.render(edits)?;
        integrity::verify_file(&self.path, &self.fingerprint)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(rendered.as_bytes())?;
        staged.as_file().sync_all()?;
        let permissions = std::fs::metadata(&self.path)?.permissions();
        std::fs::set_permissions(staged.path(), permissions)?;
        staged.persist(&self.path).map_err(|err| ResxSlimError::Io(err.error))?;

        info!(bytes = rendered.len(), "container saved");
        Ok(())
    }
}

/// Walk the container once, collecting each root-level `data` element and the
/// byte range of its first `value` body.
fn index_entries(body: &str) -> std::result::Result<Vec<DataEntry>, String> {
    let mut reader = Reader::from_str(body);
    let mut entries: Vec<DataEntry> = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut in_data = false;
    let mut value_taken = false;
    let mut open_value: Option<OpenValue> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| format!("at byte {}: {err}", reader.buffer_position()))?;
        match event {
            Event::Start(tag) => {
                let name = tag.local_name();
                match depth {
                    0 => seen_root = true,
                    DATA_DEPTH if name.as_ref() == b"data" => {
                        entries.push(DataEntry::from_tag(entries.len(), &tag)?);
                        in_data = true;
                        value_taken = false;
                    }
                    VALUE_DEPTH if in_data && !value_taken && name.as_ref() == b"value" => {
                        value_taken = true;
                        open_value = Some(OpenValue {
                            content_start: reader.buffer_position() as usize,
                            text: String::new(),
                        });
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(tag) => {
                let name = tag.local_name();
                match depth {
                    0 => seen_root = true,
                    DATA_DEPTH if name.as_ref() == b"data" => {
                        entries.push(DataEntry::from_tag(entries.len(), &tag)?);
                        in_data = false;
                    }
                    VALUE_DEPTH if in_data && name.as_ref() == b"value" => value_taken = true,
                    _ => {}
                }
            }
            Event::Text(text) if depth == VALUE_DEPTH + 1 => {
                if let Some(open) = open_value.as_mut() {
                    open.text.push_str(&text.unescape().map_err(|err| err.to_string())?);
                }
            }
            Event::CData(cdata) if depth == VALUE_DEPTH + 1 => {
                if let Some(open) = open_value.as_mut() {
                    open.text
                        .push_str(std::str::from_utf8(&cdata).map_err(|err| err.to_string())?);
                }
            }
            Event::End(tag) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced end tag at byte {}", reader.buffer_position()))?;
                let name = tag.local_name();
                match depth {
                    VALUE_DEPTH if name.as_ref() == b"value" => {
                        if let Some(open) = open_value.take() {
                            let tag_end = reader.buffer_position() as usize;
                            let content_end = rfind(&body.as_bytes()[..tag_end], b"</")
                                .ok_or_else(|| format!("end tag without `</` before byte {tag_end}"))?;
                            if let Some(entry) = entries.last_mut() {
                                entry.value_span = Some(open.content_start..content_end);
                                entry.value = (!open.text.is_empty()).then_some(open.text);
                            }
                        }
                    }
                    DATA_DEPTH if name.as_ref() == b"data" => in_data = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(format!("{depth} element(s) left open at end of document"));
    }
    if !seen_root {
        return Err("no root element".into());
    }
    Ok(entries)
}

/// Narrow `span` to its non-whitespace core. All-whitespace spans are kept whole.
fn trim_span(text: &str, span: Range<usize>) -> Range<usize> {
    let content = &text[span.clone()];
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return span;
    }
    let lead = content.len() - content.trim_start().len();
    span.start + lead..span.start + lead + trimmed.len()
}

fn malformed(path: &Path, detail: String) -> ResxSlimError {
    ResxSlimError::MalformedContainer {
        path: path.display().to_string(),
        detail,
    }
}
