// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-backed compressor — runs the configured command-line tool for a
// file's extension (optipng, jpegtran, gifsicle, ...) under a timeout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use resxslim_core::config::{OptimizerConfig, ToolCommand};
use resxslim_core::error::{ResxSlimError, Result};
use resxslim_core::types::{CompressionMode, CompressionResult};
use tracing::{debug, info, warn};

use super::ImageCompressor;

/// Dispatches each file to an external program chosen by its extension.
///
/// Stateless between calls, so one instance can be shared by concurrent
/// optimisation passes.
pub struct CommandCompressor {
    tools: BTreeMap<String, ToolCommand>,
    timeout: Duration,
}

impl CommandCompressor {
    pub fn new(tools: BTreeMap<String, ToolCommand>, timeout: Duration) -> Self {
        Self { tools, timeout }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.tools.clone(), config.timeout())
    }

    /// Run the tool to completion on a private current-thread runtime, so
    /// `compress_file` stays a blocking call.
    fn run(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run_with_timeout(program, args, self.timeout))
    }

    /// Sibling path the tool is asked to write: `name.png` -> `name.min.png`.
    fn output_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match input.extension() {
            Some(ext) => format!("{}.min.{}", stem, ext.to_string_lossy()),
            None => format!("{stem}.min"),
        };
        input.with_file_name(name)
    }
}

impl ImageCompressor for CommandCompressor {
    fn compress_file(&self, path: &Path, mode: CompressionMode) -> Result<CompressionResult> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let tool = self
            .tools
            .get(&ext)
            .ok_or_else(|| ResxSlimError::NoCompressorForExtension(ext.clone()))?;

        let original_size = std::fs::metadata(path)?.len();
        let output = if tool.writes_output(mode) {
            Self::output_path(path)
        } else {
            path.to_path_buf()
        };

        let input_arg = path.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args: Vec<String> = tool
            .args_for(mode)
            .iter()
            .map(|arg| arg.replace("{input}", &input_arg).replace("{output}", &output_arg))
            .collect();
        let program = tool.program_for(mode);

        debug!(program, ?args, "launching compressor");
        let status = self.run(program, &args);
        let status = match status {
            Ok(status) if status.success() => status,
            other => {
                if output != path {
                    discard(&output);
                }
                return match other {
                    Ok(status) => Err(ResxSlimError::Compressor(format!(
                        "{program} exited with {status}"
                    ))),
                    Err(err) => Err(err),
                };
            }
        };

        let result_size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        let result = CompressionResult {
            original_size,
            result_size,
            result_path: output.exists().then_some(output),
        };
        info!(
            program,
            %status,
            original_size,
            result_size,
            reduced = result.is_reduction(),
            "compressor finished"
        );
        Ok(result)
    }
}

/// Spawn `program` and wait for it, killing it once `timeout` elapses.
async fn run_with_timeout(program: &str, args: &[String], timeout: Duration) -> Result<ExitStatus> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ResxSlimError::Compressor(format!("failed to launch {program}: {err}")))?;

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    match waited {
        Ok(status) => Ok(status?),
        Err(_) => {
            if let Err(err) = child.kill().await {
                warn!(program, error = %err, "failed to kill timed-out compressor");
            }
            Err(ResxSlimError::CompressorTimeout(timeout))
        }
    }
}

fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove partial output");
        }
    }
}
