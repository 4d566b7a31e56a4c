// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optimizer configuration, persisted as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResxSlimError, Result};
use crate::types::CompressionMode;

/// What to do when the four bytes before an envelope payload do not hold its length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthPrefixPolicy {
    /// Leave the bytes alone and still emit the rewritten envelope.
    #[default]
    Preserve,
    /// Give up on the entry; it is reported as a zero-result.
    Reject,
}

/// One external tool invocation. `{input}` and `{output}` in the argument
/// lists are replaced with the transient file paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Program used in `Lossy` mode. Falls back to `program` when absent.
    #[serde(default)]
    pub lossy_program: Option<String>,
    /// Arguments used in `Lossy` mode. Falls back to `args` when absent.
    #[serde(default)]
    pub lossy_args: Option<Vec<String>>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            lossy_program: None,
            lossy_args: None,
        }
    }

    pub fn with_lossy_args(mut self, args: &[&str]) -> Self {
        self.lossy_args = Some(args.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn with_lossy_program(mut self, program: impl Into<String>) -> Self {
        self.lossy_program = Some(program.into());
        self
    }

    /// Program for the requested mode.
    pub fn program_for(&self, mode: CompressionMode) -> &str {
        match (mode, &self.lossy_program) {
            (CompressionMode::Lossy, Some(lossy)) => lossy,
            _ => &self.program,
        }
    }

    /// Arguments for the requested mode.
    pub fn args_for(&self, mode: CompressionMode) -> &[String] {
        match (mode, &self.lossy_args) {
            (CompressionMode::Lossy, Some(lossy)) => lossy,
            _ => &self.args,
        }
    }

    /// Whether the tool writes a separate output file rather than rewriting its input.
    pub fn writes_output(&self, mode: CompressionMode) -> bool {
        self.args_for(mode).iter().any(|arg| arg.contains("{output}"))
    }
}

/// Persistent optimizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Compression mode used when the caller does not pick one.
    pub mode: CompressionMode,
    /// Handling of an unconfirmed length prefix in object-graph envelopes.
    pub length_prefix_policy: LengthPrefixPolicy,
    /// Reject compressor output that no longer looks like the input's format.
    pub verify_output_format: bool,
    /// Directory for transient image files. `None` uses the OS temp directory.
    pub temp_dir: Option<PathBuf>,
    /// Upper bound on a single tool run.
    pub timeout_secs: u64,
    /// External tools keyed by lowercase file extension.
    pub tools: BTreeMap<String, ToolCommand>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert(
            "png".to_owned(),
            ToolCommand::new("optipng", &["-quiet", "-o2", "-strip", "all", "-out", "{output}", "{input}"])
                .with_lossy_program("pngquant")
                .with_lossy_args(&["--force", "--skip-if-larger", "--output", "{output}", "{input}"]),
        );
        tools.insert(
            "jpg".to_owned(),
            ToolCommand::new(
                "jpegtran",
                &["-copy", "none", "-optimize", "-progressive", "-outfile", "{output}", "{input}"],
            ),
        );
        tools.insert(
            "gif".to_owned(),
            ToolCommand::new("gifsicle", &["-O3", "--output", "{output}", "{input}"])
                .with_lossy_args(&["-O3", "--lossy=80", "--output", "{output}", "{input}"]),
        );

        Self {
            mode: CompressionMode::Lossless,
            length_prefix_policy: LengthPrefixPolicy::Preserve,
            verify_output_format: true,
            temp_dir: None,
            timeout_secs: 60,
            tools,
        }
    }
}

impl OptimizerConfig {
    /// Read a configuration file written by [`OptimizerConfig::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ResxSlimError::Config("timeout_secs must be positive".into()));
        }
        for (ext, tool) in &self.tools {
            for mode in [CompressionMode::Lossless, CompressionMode::Lossy] {
                if tool.program_for(mode).trim().is_empty() {
                    return Err(ResxSlimError::Config(format!(
                        "empty {mode:?} program for .{ext}"
                    )));
                }
                if !tool.args_for(mode).iter().any(|arg| arg.contains("{input}")) {
                    return Err(ResxSlimError::Config(format!(
                        "{mode:?} arguments for .{ext} never mention {{input}}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory for transient files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Tool registered for `ext`, matched case-insensitively.
    pub fn tool_for(&self, ext: &str) -> Option<&ToolCommand> {
        self.tools.get(&ext.to_ascii_lowercase())
    }
}
