//! Error types for the ovaexport core library.

use std::path::PathBuf;
use std::process::ExitStatus;

use crate::config::ValidationErrors;
use crate::strip::Device;

/// The main error type for ovaexport operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// Error parsing a VMX file.
    #[error("VMX parse error: {message}")]
    VmxParse { message: String },

    /// One or more configuration violations, reported together.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// `post_process` was called before a successful `configure`.
    #[error("post-processor has not been configured")]
    NotConfigured,

    /// The artifact was produced by a builder this post-processor can't handle.
    #[error("Unknown artifact type, can't build box: {builder_id}")]
    UnsupportedArtifact { builder_id: String },

    /// The artifact has no `.vmx` file.
    #[error("VMX file not found")]
    VmxNotFound,

    /// Stripping a device from the VMX failed.
    #[error("Removing {device} from VMX failed: {source}")]
    DeviceRemoval {
        device: Device,
        #[source]
        source: Box<Error>,
    },

    /// The conversion tool could not be started.
    #[error("Failed to launch '{}': {source}", program.display())]
    ConversionLaunch {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The conversion tool ran and exited unsuccessfully.
    #[error("Failed: {status}\nStdout: {stdout}{}", stderr_section(stderr))]
    Conversion {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

/// A specialized Result type for ovaexport operations.
pub type Result<T> = std::result::Result<T, Error>;

fn stderr_section(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\nStderr: {}", stderr)
    }
}

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a VMX parse error.
    pub fn vmx_parse(message: impl Into<String>) -> Self {
        Self::VmxParse {
            message: message.into(),
        }
    }

    /// Wrap a failure that happened while removing `device`.
    pub fn device_removal(device: Device, source: Error) -> Self {
        Self::DeviceRemoval {
            device,
            source: Box::new(source),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io(io_err, "/path/to/file.vmx");
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("/path/to/file.vmx"));
    }

    #[test]
    fn test_io_error_without_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io_simple(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(!msg.contains("at '"));
    }

    #[test]
    fn test_vmx_parse_error() {
        let err = Error::vmx_parse("line 3: missing key");
        assert!(err.to_string().contains("VMX parse error"));
        assert!(err.to_string().contains("missing key"));
    }

    #[test]
    fn test_unsupported_artifact_error() {
        let err = Error::UnsupportedArtifact {
            builder_id: "mitchellh.virtualbox".to_string(),
        };
        assert!(err.to_string().contains("mitchellh.virtualbox"));
    }

    #[test]
    fn test_device_removal_wraps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::device_removal(Device::Floppy, Error::io(io_err, "/vm/vm.vmx"));
        let msg = err.to_string();
        assert!(msg.starts_with("Removing floppy drive from VMX failed"));
        assert!(msg.contains("/vm/vm.vmx"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stderr_section_omitted_when_blank() {
        assert_eq!(stderr_section(""), "");
        assert_eq!(stderr_section("  \n"), "");
        assert_eq!(stderr_section("boom"), "\nStderr: boom");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { path: None, .. }));
    }
}
