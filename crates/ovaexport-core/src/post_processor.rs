//! The OVA export post-processor.
//!
//! A post-processor is configured once and may then process any number of
//! artifacts, one at a time. Processing an artifact:
//! 1. Checks that a supported builder produced it
//! 2. Finds its VMX file
//! 3. Strips the configured devices (ethernet, floppy, optical drive)
//! 4. Runs `ovftool` to write the export to the target
//!
//! If any step fails the VMX is restored to its contents before step 3.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::artifact::{find_vmx, Artifact};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ovftool::{ConversionRequest, Ovftool};
use crate::strip::{announce_removal, remove_device};
use crate::vmx;
use crate::ui::Ui;

/// Builder ids whose artifacts can be exported.
pub const SUPPORTED_BUILDERS: &[&str] = &["mitchellh.vmware"];

/// Result of a successful [`PostProcessor::post_process`] call.
#[derive(Debug)]
pub struct ProcessOutcome<A> {
    /// The artifact to hand to the next step.
    pub artifact: A,
    /// `false` if later post-processors should still run.
    pub is_final: bool,
}

/// A step run by the host after a build completes.
pub trait PostProcessor {
    /// Validate raw configuration fragments and keep the result.
    fn configure(&mut self, raws: &[Value]) -> Result<()>;

    /// Process one artifact.
    fn post_process<A: Artifact>(&self, ui: &dyn Ui, artifact: A) -> Result<ProcessOutcome<A>>;
}

/// Strips devices from a VMware VM and exports it with `ovftool`.
#[derive(Debug, Default)]
pub struct OvaExport {
    config: Option<Config>,
}

impl OvaExport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A post-processor with an already validated configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            config: Some(config),
        }
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    fn strip_and_convert(&self, ui: &dyn Ui, config: &Config, vmx: &Path) -> Result<()> {
        for device in config.devices_to_remove() {
            remove_device(ui, vmx, device)?;
        }

        ui.message(&format!("Exporting {} to {}", vmx.display(), config.target));
        let request = ConversionRequest::from_config(vmx, config);
        Ovftool::new(&config.ovftool).convert(ui, &request)?;

        Ok(())
    }
}

impl PostProcessor for OvaExport {
    fn configure(&mut self, raws: &[Value]) -> Result<()> {
        let config = Config::decode(raws)?;
        info!(destination = %config.target, disk_mode = %config.disk_mode, compression = %config.compression, "configured");
        self.config = Some(config);
        Ok(())
    }

    fn post_process<A: Artifact>(&self, ui: &dyn Ui, artifact: A) -> Result<ProcessOutcome<A>> {
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;

        if !SUPPORTED_BUILDERS.contains(&artifact.builder_id()) {
            return Err(Error::UnsupportedArtifact {
                builder_id: artifact.builder_id().to_string(),
            });
        }

        let vmx = find_vmx(&artifact).ok_or(Error::VmxNotFound)?.to_path_buf();
        info!(vmx = %vmx.display(), artifact = %artifact.describe(), "processing artifact");

        let snapshot = match config.devices_to_remove().next() {
            Some(first) => match VmxSnapshot::capture(&vmx) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    announce_removal(ui, &vmx, first);
                    return Err(Error::device_removal(first, e));
                }
            },
            None => None,
        };

        if let Err(err) = self.strip_and_convert(ui, config, &vmx) {
            if let Some(snapshot) = snapshot {
                snapshot.restore();
            }
            return Err(err);
        }

        Ok(ProcessOutcome {
            artifact,
            is_final: false,
        })
    }
}

/// Original bytes of a VMX, written back if processing fails.
struct VmxSnapshot {
    path: PathBuf,
    contents: Vec<u8>,
}

impl VmxSnapshot {
    fn capture(path: &Path) -> Result<Self> {
        let contents = fs::read(path).map_err(|e| Error::io(e, path))?;
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    fn restore(self) {
        match vmx::replace_contents(&self.path, &self.contents) {
            Ok(()) => info!(vmx = %self.path.display(), "restored VMX after failure"),
            Err(e) => warn!(vmx = %self.path.display(), error = %e, "could not restore VMX"),
        }
    }
}
