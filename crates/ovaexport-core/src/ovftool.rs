//! Invocation of VMware's `ovftool` converter.
//!
//! The tool is run to completion with no timeout. Both output streams are
//! captured: stdout is relayed to the operator on success, and both are
//! carried in the error on failure.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::{Compression, Config, DiskMode};
use crate::error::{Error, Result};
use crate::ui::Ui;

/// What to convert and how.
#[derive(Debug, Clone)]
pub struct ConversionRequest<'a> {
    /// The VMX describing the source VM.
    pub source: &'a Path,
    /// Where the tool writes its output.
    pub destination: &'a str,
    pub disk_mode: DiskMode,
    pub compression: Compression,
}

impl<'a> ConversionRequest<'a> {
    /// Build a request for `source` from a validated configuration.
    pub fn from_config(source: &'a Path, config: &'a Config) -> Self {
        Self {
            source,
            destination: &config.target,
            disk_mode: config.disk_mode,
            compression: config.compression,
        }
    }

    /// Tool arguments, in the order the tool expects them.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            OsString::from("--acceptAllEulas"),
            OsString::from(format!("--diskMode={}", self.disk_mode)),
            OsString::from(format!("--compress={}", self.compression)),
            self.source.as_os_str().to_os_string(),
            OsString::from(self.destination),
        ]
    }
}

/// Handle to an `ovftool` executable.
#[derive(Debug, Clone)]
pub struct Ovftool {
    program: PathBuf,
}

impl Ovftool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the conversion and wait for it to finish.
    ///
    /// On success the captured stdout is sent to `ui` and returned.
    ///
    /// # Errors
    ///
    /// [`Error::ConversionLaunch`] if the tool can't be started,
    /// [`Error::Conversion`] if it exits unsuccessfully.
    pub fn convert(&self, ui: &dyn Ui, request: &ConversionRequest<'_>) -> Result<String> {
        let args = request.args();
        debug!(
            program = %self.program.display(),
            "Starting ovftool with parameters: {}",
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| Error::ConversionLaunch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::Conversion {
                status: output.status,
                stdout,
                stderr,
            });
        }

        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim_end(), "ovftool wrote to stderr");
        }
        info!(destination = request.destination, "conversion finished");

        ui.message(&stdout);
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(compression: Compression) -> ConversionRequest<'static> {
        ConversionRequest {
            source: Path::new("/build/vm.vmx"),
            destination: "/out/vm.ova",
            disk_mode: DiskMode::Thick,
            compression,
        }
    }

    #[test]
    fn test_args_order() {
        let args = request(Compression::MAX).args();
        assert_eq!(
            args,
            vec![
                "--acceptAllEulas",
                "--diskMode=thick",
                "--compress=9",
                "/build/vm.vmx",
                "/out/vm.ova",
            ]
        );
    }

    #[test]
    fn test_args_no_compression() {
        let args = request(Compression::NONE).args();
        assert_eq!(args[2], "--compress=0");
    }

    #[test]
    fn test_launch_failure() {
        let tool = Ovftool::new("/nonexistent/ovftool");
        let ui = crate::ui::RecordingUi::new();
        let err = tool.convert(&ui, &request(Compression::MAX)).unwrap_err();
        assert!(matches!(err, Error::ConversionLaunch { .. }));
        assert!(ui.messages().is_empty());
    }
}
