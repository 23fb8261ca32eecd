//! ovaexport Core Library
//!
//! This crate provides a build post-processor that prepares VMware VMs for
//! distribution and converts them to OVA/OVF with VMware's `ovftool`.
//!
//! # Overview
//!
//! The post-processor is configured once from loosely typed JSON fragments,
//! then handed build artifacts. For each artifact it locates the VMX file,
//! optionally strips the ethernet adapter, floppy drive and optical drive,
//! and runs `ovftool` to write the export to the configured target.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`config`] - Configuration decoding and validation
//! - [`template`] - `{{ ... }}` interpolation in configuration strings
//! - [`vmx`] - VMX file reading and writing
//! - [`strip`] - Device removal from VMX files
//! - [`ovftool`] - Conversion tool invocation
//! - [`artifact`] - Build artifacts
//! - [`ui`] - Operator message sink
//! - [`post_processor`] - The export pipeline
//!
//! # Quick Start
//!
//! ```no_run
//! use ovaexport_core::{BuildArtifact, ConsoleUi, OvaExport, PostProcessor};
//! use serde_json::json;
//!
//! let mut pp = OvaExport::new();
//! pp.configure(&[json!({"target": "/out/vm.ova", "remove_floppy": "true"})]).unwrap();
//!
//! let artifact = BuildArtifact::new("mitchellh.vmware", ["/build/vm.vmx", "/build/disk.vmdk"]);
//! pp.post_process(&ConsoleUi, artifact).unwrap();
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod ovftool;
pub mod post_processor;
pub mod strip;
pub mod template;
pub mod ui;
pub mod vmx;

pub use error::{Error, Result};

// Re-export the pipeline surface for convenience
pub use artifact::{Artifact, BuildArtifact};
pub use config::{Compression, Config, ConfigError, DiskMode, ValidationErrors};
pub use post_processor::{OvaExport, PostProcessor, ProcessOutcome, SUPPORTED_BUILDERS};
pub use strip::Device;
pub use ui::{ConsoleUi, RecordingUi, Ui};
