// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External rasterizer seam. Some fixes (transparency flattening, font
// outlining, ink limiting of images) need a full PDF renderer. The engine does
// not ship one; it delegates to an optional external tool behind the
// `Rasterizer` trait and keeps working without it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use preflight_core::RasterizerConfig;
use preflight_core::error::{PreflightError, Result};
use tracing::{debug, info, instrument, warn};

/// Work that can be handed to a rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RasterJob {
    /// Composite transparency into opaque content.
    Flatten,
    /// Replace text with vector outlines.
    OutlineFonts,
    /// Re-render with an ink ceiling, in percent.
    ReduceInk { max_tac: f64 },
    /// Re-render separations as process color.
    ConvertSpots,
}

impl RasterJob {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Flatten => "flatten",
            Self::OutlineFonts => "outline-fonts",
            Self::ReduceInk { .. } => "reduce-ink",
            Self::ConvertSpots => "convert-spots",
        }
    }
}

/// A tool that re-renders a whole PDF.
pub trait Rasterizer: Send + Sync {
    /// Human-readable tool name, used in logs and fix notes.
    fn name(&self) -> &str;

    /// Run `job` over `pdf` and return the re-rendered document.
    fn run(&self, pdf: &[u8], job: RasterJob) -> Result<Vec<u8>>;
}

/// Binary names tried on `PATH`, in order.
const GHOSTSCRIPT_BINARIES: [&str; 3] = ["gs", "gswin64c", "gswin32c"];

/// Ghostscript's `pdfwrite` device.
#[derive(Debug, Clone)]
pub struct Ghostscript {
    binary: PathBuf,
}

impl Ghostscript {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Find a usable binary. `None` when delegation is disabled, the
    /// configured path does not exist, or nothing is on `PATH`.
    pub fn locate(config: &RasterizerConfig) -> Option<Self> {
        if config.disabled {
            debug!("Rasterizer disabled by configuration");
            return None;
        }
        if let Some(path) = &config.ghostscript_path {
            if path.is_file() {
                return Some(Self::new(path));
            }
            warn!(path = %path.display(), "Configured Ghostscript binary not found");
            return None;
        }
        let found = std::env::var_os("PATH").and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                GHOSTSCRIPT_BINARIES
                    .iter()
                    .map(|name| dir.join(name))
                    .find(|candidate| candidate.is_file())
            })
        });
        match found {
            Some(binary) => {
                info!(binary = %binary.display(), "Ghostscript located");
                Some(Self::new(binary))
            }
            None => {
                debug!("No Ghostscript binary on PATH");
                None
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line arguments for one job.
    pub fn arguments(job: RasterJob, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-q", "-dNOPAUSE", "-dBATCH", "-dSAFER", "-sDEVICE=pdfwrite"]
            .into_iter()
            .map(String::from)
            .collect();
        match job {
            RasterJob::Flatten => args.push("-dCompatibilityLevel=1.3".into()),
            RasterJob::OutlineFonts => args.push("-dNoOutputFonts".into()),
            RasterJob::ReduceInk { .. } | RasterJob::ConvertSpots => {
                args.push("-sColorConversionStrategy=CMYK".into());
                args.push("-dProcessColorModel=/DeviceCMYK".into());
            }
        }
        args.push(format!("-sOutputFile={}", output.display()));
        args.push(input.display().to_string());
        args
    }

    /// Run `job` with its scratch files in a private directory under `root`.
    /// The directory is removed when the call returns or unwinds.
    #[instrument(skip_all, fields(job = job.label(), input_len = pdf.len()))]
    pub fn run_in(&self, root: &Path, pdf: &[u8], job: RasterJob) -> Result<Vec<u8>> {
        let scratch = tempfile::Builder::new().prefix("preflight-").tempdir_in(root)?;
        let input = scratch.path().join("in.pdf");
        let output = scratch.path().join("out.pdf");

        fs::write(&input, pdf)?;
        let status = Command::new(&self.binary)
            .args(Self::arguments(job, &input, &output))
            .output()
            .map_err(|err| {
                PreflightError::ExternalTool(format!(
                    "cannot start {}: {}",
                    self.binary.display(),
                    err
                ))
            })?;
        if !status.status.success() {
            return Err(PreflightError::ExternalTool(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }
        let bytes = fs::read(&output)?;
        info!(output_len = bytes.len(), "Rasterizer finished");
        Ok(bytes)
    }
}

impl Rasterizer for Ghostscript {
    fn name(&self) -> &str {
        "ghostscript"
    }

    fn run(&self, pdf: &[u8], job: RasterJob) -> Result<Vec<u8>> {
        self.run_in(&std::env::temp_dir(), pdf, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_locates_nothing() {
        let config = RasterizerConfig {
            ghostscript_path: None,
            disabled: true,
        };
        assert!(Ghostscript::locate(&config).is_none());
    }

    #[test]
    fn missing_explicit_binary_locates_nothing() {
        let config = RasterizerConfig {
            ghostscript_path: Some(PathBuf::from("/nonexistent/preflight/gs")),
            disabled: false,
        };
        assert!(Ghostscript::locate(&config).is_none());
    }

    #[test]
    fn arguments_carry_job_flags() {
        let input = Path::new("/tmp/in.pdf");
        let output = Path::new("/tmp/out.pdf");

        let flatten = Ghostscript::arguments(RasterJob::Flatten, input, output);
        assert_eq!(flatten[..5], ["-q", "-dNOPAUSE", "-dBATCH", "-dSAFER", "-sDEVICE=pdfwrite"]);
        assert!(flatten.contains(&"-dCompatibilityLevel=1.3".to_string()));
        assert_eq!(flatten.last().map(String::as_str), Some("/tmp/in.pdf"));
        assert!(flatten.contains(&"-sOutputFile=/tmp/out.pdf".to_string()));

        let outline = Ghostscript::arguments(RasterJob::OutlineFonts, input, output);
        assert!(outline.contains(&"-dNoOutputFonts".to_string()));

        let ink = Ghostscript::arguments(RasterJob::ReduceInk { max_tac: 300.0 }, input, output);
        assert!(ink.contains(&"-sColorConversionStrategy=CMYK".to_string()));
    }

    #[test]
    fn failing_binary_is_an_external_tool_error() {
        let tool = Ghostscript::new("/nonexistent/preflight/gs");
        let err = tool.run(b"%PDF-1.4", RasterJob::Flatten).unwrap_err();
        assert!(matches!(err, PreflightError::ExternalTool(_)));
    }

    #[test]
    fn scratch_files_are_removed_after_a_failed_run() {
        let root = tempfile::tempdir().unwrap();
        let tool = Ghostscript::new("/nonexistent/preflight/gs");
        let err = tool
            .run_in(root.path(), b"%PDF-1.4 customer document", RasterJob::OutlineFonts)
            .unwrap_err();
        assert!(matches!(err, PreflightError::ExternalTool(_)));
        let leftovers: Vec<_> = fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn missing_scratch_root_is_an_io_error() {
        let tool = Ghostscript::new("/nonexistent/preflight/gs");
        let err = tool
            .run_in(Path::new("/nonexistent/preflight/scratch"), b"%PDF-1.4", RasterJob::Flatten)
            .unwrap_err();
        assert!(matches!(err, PreflightError::Io(_)));
    }
}
