// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Container rewriter — one optimisation pass over a .resx container.
//
// Each entry is classified, its image isolated and compressed, and the result
// spliced back into a new value. Edits are collected during the scan and the
// container is written once at the end, only if something improved.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resxslim_core::config::OptimizerConfig;
use resxslim_core::error::{ResxSlimError, Result};
use resxslim_core::types::{CompressionMode, EntryResult, FormatKind};
use tracing::{debug, info, instrument, warn};

use super::document::{DataEntry, ResxDocument};
use super::envelope;
use crate::compress::{CompressionAdapter, ImageCompressor};
use crate::{payload, signature};

/// Optimise every embedded image in the container at `container_path` with
/// the default configuration.
pub fn optimize(
    container_path: impl AsRef<Path>,
    compressor: &dyn ImageCompressor,
    mode: CompressionMode,
) -> Result<Vec<EntryResult>> {
    ContainerRewriter::new(compressor).optimize(container_path.as_ref(), mode)
}

/// Runs optimisation passes over containers with a shared compressor.
///
/// Holds no per-container state, so one rewriter may serve concurrent passes
/// over different containers.
pub struct ContainerRewriter<'a> {
    compressor: &'a dyn ImageCompressor,
    config: OptimizerConfig,
}

impl<'a> ContainerRewriter<'a> {
    pub fn new(compressor: &'a dyn ImageCompressor) -> Self {
        Self {
            compressor,
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Optimise one container.
    ///
    /// Returns one result per image entry, improved or not. Non-image entries
    /// are not reported. A path that does not exist yields an empty list; an
    /// unusable path is an error raised before any entry is touched.
    #[instrument(skip(self), fields(path = %container_path.display()))]
    pub fn optimize(&self, container_path: &Path, mode: CompressionMode) -> Result<Vec<EntryResult>> {
        validate_path(container_path)?;
        if !container_path.exists() {
            debug!("container does not exist; nothing to do");
            return Ok(Vec::new());
        }

        let document = ResxDocument::load(container_path)?;
        let adapter = CompressionAdapter::new(self.compressor, self.config.temp_dir())
            .verify_output_format(self.config.verify_output_format);

        let mut results = Vec::new();
        let mut edits: Vec<(usize, String)> = Vec::new();
        for entry in document.entries() {
            let Some(result) = self.process_entry(entry, container_path, &adapter, mode) else {
                continue;
            };
            if let Some(value) = &result.optimized_value {
                edits.push((entry.index, value.clone()));
            }
            results.push(result);
        }

        if edits.is_empty() {
            debug!(reported = results.len(), "no entry improved; container left untouched");
        } else {
            document.save_with(&edits)?;
            let saved: u64 = results.iter().map(EntryResult::saving).sum();
            info!(improved = edits.len(), saved, "container optimised");
        }
        Ok(results)
    }

    /// `None` when the entry is not an image and must not be reported.
    fn process_entry(
        &self,
        entry: &DataEntry,
        container_path: &Path,
        adapter: &CompressionAdapter<'_>,
        mode: CompressionMode,
    ) -> Option<EntryResult> {
        let text = entry.value.as_deref().filter(|text| !text.trim().is_empty())?;

        let provisional = signature::classify(
            entry.declared_type.as_deref(),
            entry.declared_mimetype.as_deref(),
        );
        if !provisional.is_image() {
            return None;
        }

        let decoded = decode_value(text);
        let kind = signature::confirm(provisional, decoded.as_deref().ok());
        if !kind.is_image() {
            debug!(name = %entry.name, "no image signature in envelope; skipped");
            return None;
        }

        let zero = |size: usize| EntryResult::zero(&entry.name, container_path, size as u64);

        let bytes = match decoded {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Some(zero(0)),
            Err(err) => {
                debug!(name = %entry.name, error = %err, "undecodable image value");
                return Some(zero(0));
            }
        };

        let Some(found) = payload::extract(&bytes, kind) else {
            debug!(name = %entry.name, "no image payload located");
            return Some(zero(bytes.len()));
        };
        if !found.boundary.is_confident() {
            warn!(
                name = %entry.name,
                boundary = ?found.boundary,
                offset = found.envelope_offset,
                length = found.envelope_length,
                "image end is a best guess"
            );
        }

        let Some(extension) = signature::detect_image_extension(found.image_bytes) else {
            debug!(name = %entry.name, "payload has no recognisable signature");
            return Some(zero(bytes.len()));
        };

        let Some(optimized) = adapter.compress(found.image_bytes, extension, mode) else {
            return Some(zero(bytes.len()));
        };

        let rebuilt = match kind {
            FormatKind::ByteArrayImage => optimized,
            FormatKind::ObjectGraphImage => match envelope::reassemble(
                &bytes,
                found.envelope_offset,
                found.envelope_length,
                &optimized,
                self.config.length_prefix_policy,
            ) {
                Ok(rebuilt) => rebuilt,
                Err(err) => {
                    warn!(name = %entry.name, error = %err, "envelope not rewritten");
                    return Some(zero(bytes.len()));
                }
            },
            FormatKind::NotAnImage => return None,
        };

        info!(
            name = %entry.name,
            from = bytes.len(),
            to = rebuilt.len(),
            "entry optimised"
        );
        Some(EntryResult::improved(
            &entry.name,
            container_path,
            bytes.len() as u64,
            rebuilt.len() as u64,
            BASE64.encode(&rebuilt),
        ))
    }
}

/// Decode a stored value, ignoring the whitespace containers wrap it with.
fn decode_value(text: &str) -> Result<Vec<u8>> {
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(&compact)
        .map_err(|err| ResxSlimError::InvalidBase64(err.to_string()))
}

/// Reject paths that can never name a container file.
fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ResxSlimError::InvalidPath("empty path".into()));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(ResxSlimError::InvalidPath(format!(
            "{} contains a NUL byte",
            path.display()
        )));
    }
    if path.exists() && !path.is_file() {
        return Err(ResxSlimError::InvalidPath(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use resxslim_core::config::LengthPrefixPolicy;
    use resxslim_core::types::{CompressionResult, ImageFormat};
    use std::path::PathBuf;

    const BITMAP: &str = "System.Drawing.Bitmap, System.Drawing";
    const BYTE_ARRAY: &str = "application/x-microsoft.net.object.bytearray.base64";
    const BINARY: &str = "application/x-microsoft.net.object.binary.base64";
    const TRAILER: [u8; 8] = [0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    const STRING_ENTRY: &str = r#"  <data name="Greeting" xml:space="preserve">
    <value>Hello &amp; welcome</value>
    <comment>Shown   on start</comment>
  </data>
"#;
    const FILE_REF_ENTRY: &str = r#"  <data name="AppIcon" type="System.Resources.ResXFileRef, System.Windows.Forms">
    <value>..\Resources\app.ico;System.Drawing.Icon, System.Drawing</value>
  </data>
"#;

    /// Re-emits every image at `target` bytes, or unchanged when already that small.
    struct Squeeze {
        target: usize,
    }

    impl ImageCompressor for Squeeze {
        fn compress_file(&self, path: &Path, _mode: CompressionMode) -> Result<CompressionResult> {
            let input = std::fs::read(path)?;
            let size = input.len().min(self.target);
            let output = match signature::detect_image_format(&input) {
                Some(ImageFormat::Png) => fixtures::png(size),
                Some(ImageFormat::Jpeg) => fixtures::jpeg(size),
                Some(ImageFormat::Gif) => fixtures::gif(size),
                None => input.clone(),
            };
            let out_path = path.with_extension("squeezed");
            std::fs::write(&out_path, &output)?;
            Ok(CompressionResult {
                original_size: input.len() as u64,
                result_size: output.len() as u64,
                result_path: Some(out_path),
            })
        }
    }

    fn resx(entries: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root>\n  <resheader name=\"resmimetype\">\n    <value>text/microsoft-resx</value>\n  </resheader>\n{}</root>\n",
            entries.concat()
        )
    }

    fn data(name: &str, ty: Option<&str>, mimetype: &str, value: &str) -> String {
        let ty = ty.map(|t| format!(" type=\"{t}\"")).unwrap_or_default();
        format!(
            "  <data name=\"{name}\"{ty} mimetype=\"{mimetype}\">\n    <value>\n        {value}\n</value>\n  </data>\n"
        )
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        scratch: PathBuf,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Form1.resx");
            std::fs::write(&path, text).unwrap();
            let scratch = dir.path().join("scratch");
            std::fs::create_dir(&scratch).unwrap();
            Self {
                _dir: dir,
                path,
                scratch,
            }
        }

        fn rewriter<'a>(&self, compressor: &'a dyn ImageCompressor) -> ContainerRewriter<'a> {
            let config = OptimizerConfig {
                temp_dir: Some(self.scratch.clone()),
                ..OptimizerConfig::default()
            };
            ContainerRewriter::new(compressor).with_config(config)
        }

        fn text(&self) -> String {
            std::fs::read_to_string(&self.path).unwrap()
        }

        fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(&self.scratch).unwrap().next().is_none()
        }
    }

    #[cfg(unix)]
    fn inode(path: &Path) -> u64 {
        use std::os::unix::fs::MetadataExt;
        std::fs::metadata(path).unwrap().ino()
    }

    fn decode_entry(text: &str, name: &str) -> Vec<u8> {
        let doc = ResxDocument::from_text("check.resx", text.to_owned()).unwrap();
        let entry = doc.entries().iter().find(|e| e.name == name).unwrap();
        decode_value(entry.value.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn byte_array_png_scenario() {
        let original = BASE64.encode(fixtures::png(1000));
        let text = resx(&[
            data("Logo", Some(BITMAP), BYTE_ARRAY, &original),
            STRING_ENTRY.to_owned(),
        ]);
        let fixture = Fixture::new(&text);
        let compressor = Squeeze { target: 800 };

        let results = fixture
            .rewriter(&compressor)
            .optimize(&fixture.path, CompressionMode::Lossless)
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.resource_name, "Logo");
        assert_eq!(result.container_path, fixture.path);
        assert_eq!(result.original_size, 1000);
        assert_eq!(result.optimized_size, 800);
        assert_eq!(result.saving(), 200);

        let new_value = result.optimized_value.clone().unwrap();
        let on_disk = fixture.text();
        assert_eq!(on_disk, text.replace(&original, &new_value));
        assert!(on_disk.contains(STRING_ENTRY));

        let image = decode_entry(&on_disk, "Logo");
        assert_eq!(image.len(), 800);
        assert!(image.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(fixture.scratch_is_empty());
    }

    #[test]
    fn object_graph_scenario() {
        let envelope = fixtures::envelope(12, &fixtures::png(500), &TRAILER);
        let text = resx(&[data("Banner", None, BINARY, &BASE64.encode(&envelope))]);
        let fixture = Fixture::new(&text);
        let compressor = Squeeze { target: 300 };

        let results = fixture
            .rewriter(&compressor)
            .optimize(&fixture.path, CompressionMode::Lossless)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].original_size, 524);
        assert_eq!(results[0].optimized_size, 324);

        let rebuilt = decode_entry(&fixture.text(), "Banner");
        assert_eq!(rebuilt.len(), 12 + 4 + 300 + 8);
        assert_eq!(&rebuilt[..12], &envelope[..12]);
        assert_eq!(u32::from_le_bytes(rebuilt[12..16].try_into().unwrap()), 300);
        assert_eq!(&rebuilt[rebuilt.len() - 8..], &TRAILER);

        let relocated = payload::extract(&rebuilt, FormatKind::ObjectGraphImage).unwrap();
        assert!(relocated.image_bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
    }

    #[cfg(unix)]
    #[test]
    fn empty_container_is_not_written() {
        let fixture = Fixture::new("<?xml version=\"1.0\"?>\n<root>\n</root>\n");
        let before = inode(&fixture.path);

        let results = optimize(&fixture.path, &Squeeze { target: 10 }, CompressionMode::Lossless)
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(inode(&fixture.path), before);
    }

    #[cfg(unix)]
    #[test]
    fn second_pass_finds_nothing_more() {
        let text = resx(&[
            data("Logo", Some(BITMAP), BYTE_ARRAY, &BASE64.encode(fixtures::png(1000))),
            data("Photo", None, BINARY, &BASE64.encode(fixtures::envelope(20, &fixtures::jpeg(900), &TRAILER))),
        ]);
        let fixture = Fixture::new(&text);
        let compressor = Squeeze { target: 600 };
        let rewriter = fixture.rewriter(&compressor);

        let first = rewriter.optimize(&fixture.path, CompressionMode::Lossless).unwrap();
        assert_eq!(first.iter().filter(|r| r.is_improved()).count(), 2);

        let after_first = fixture.text();
        let before = inode(&fixture.path);
        let second = rewriter.optimize(&fixture.path, CompressionMode::Lossless).unwrap();

        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|r| !r.is_improved() && r.saving() == 0));
        assert_eq!(fixture.text(), after_first);
        assert_eq!(inode(&fixture.path), before);
    }

    #[test]
    fn non_image_entries_are_neither_reported_nor_touched() {
        let text = resx(&[
            STRING_ENTRY.to_owned(),
            FILE_REF_ENTRY.to_owned(),
            data("Blob", Some("System.Byte[], mscorlib"), BYTE_ARRAY, &BASE64.encode(fixtures::png(64))),
            data("Serialized", None, BINARY, &BASE64.encode(b"a serialized string")),
            data("Logo", Some(BITMAP), BYTE_ARRAY, &BASE64.encode(fixtures::gif(400))),
        ]);
        let fixture = Fixture::new(&text);
        let compressor = Squeeze { target: 100 };

        let results = fixture
            .rewriter(&compressor)
            .optimize(&fixture.path, CompressionMode::Lossless)
            .unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.resource_name.as_str()).collect();
        assert_eq!(names, ["Logo"]);
        let on_disk = fixture.text();
        assert!(on_disk.contains(STRING_ENTRY));
        assert!(on_disk.contains(FILE_REF_ENTRY));
        assert!(on_disk.contains(&BASE64.encode(fixtures::png(64))));
        assert!(on_disk.contains(&BASE64.encode(b"a serialized string")));
    }

    #[test]
    fn bad_values_degrade_without_failing_the_pass() {
        let text = resx(&[
            data("Broken", Some(BITMAP), BYTE_ARRAY, "!!not*base64!!"),
            "  <data name=\"Blank\" type=\"System.Drawing.Bitmap, System.Drawing\" mimetype=\"application/x-microsoft.net.object.bytearray.base64\">\n    <value></value>\n  </data>\n".to_owned(),
            data("Garbled", None, BINARY, "%%%"),
            data("Bmp", Some(BITMAP), BYTE_ARRAY, &BASE64.encode(b"BM\x00\x00\x00\x00")),
            data("Logo", Some(BITMAP), BYTE_ARRAY, &BASE64.encode(fixtures::png(300))),
        ]);
        let fixture = Fixture::new(&text);
        let compressor = Squeeze { target: 200 };

        let results = fixture
            .rewriter(&compressor)
            .optimize(&fixture.path, CompressionMode::Lossless)
            .unwrap();

        let summary: Vec<(&str, bool)> = results
            .iter()
            .map(|r| (r.resource_name.as_str(), r.is_improved()))
            .collect();
        assert_eq!(summary, [("Broken", false), ("Bmp", false), ("Logo", true)]);
        assert_eq!(results[0].original_size, 0);
        assert_eq!(results[1].original_size, 6);
        assert!(fixture.text().contains("!!not*base64!!"));
    }

    #[test]
    fn rejected_length_prefix_leaves_entry_alone() {
        let mut envelope = fixtures::envelope(12, &fixtures::gif(400), &TRAILER);
        envelope[12..16].copy_from_slice(&9u32.to_le_bytes());
        let encoded = BASE64.encode(&envelope);
        let text = resx(&[data("Spinner", None, BINARY, &encoded)]);

        let strict = Fixture::new(&text);
        let compressor = Squeeze { target: 100 };
        let config = OptimizerConfig {
            temp_dir: Some(strict.scratch.clone()),
            length_prefix_policy: LengthPrefixPolicy::Reject,
            ..OptimizerConfig::default()
        };
        let results = ContainerRewriter::new(&compressor)
            .with_config(config)
            .optimize(&strict.path, CompressionMode::Lossless)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_improved());
        assert_eq!(strict.text(), text);

        let lenient = Fixture::new(&text);
        let results = lenient
            .rewriter(&compressor)
            .optimize(&lenient.path, CompressionMode::Lossless)
            .unwrap();
        assert!(results[0].is_improved());
        let rebuilt = decode_entry(&lenient.text(), "Spinner");
        assert_eq!(rebuilt.len(), 16 + 100 + 8);
        assert_eq!(&rebuilt[12..16], &9u32.to_le_bytes());
    }

    #[test]
    fn missing_container_yields_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = optimize(
            dir.path().join("Missing.resx"),
            &Squeeze { target: 10 },
            CompressionMode::Lossless,
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn unusable_paths_are_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let compressor = Squeeze { target: 10 };

        for path in [PathBuf::new(), dir.path().to_path_buf(), PathBuf::from("bad\0name.resx")] {
            let err = optimize(&path, &compressor, CompressionMode::Lossless).unwrap_err();
            assert!(matches!(err, ResxSlimError::InvalidPath(_)), "{path:?}");
        }
    }

    #[test]
    fn malformed_container_is_an_error() {
        let fixture = Fixture::new("<root><data name=\"x\">");
        let err = fixture
            .rewriter(&Squeeze { target: 10 })
            .optimize(&fixture.path, CompressionMode::Lossless)
            .unwrap_err();
        assert!(matches!(err, ResxSlimError::MalformedContainer { .. }));
    }
}
