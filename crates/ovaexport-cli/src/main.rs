//! ovaexport CLI - strip devices from VMware build artifacts and export them with ovftool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ovaexport_core::{
    BuildArtifact, ConsoleUi, Error, OvaExport, PostProcessor, Ui, SUPPORTED_BUILDERS,
};
use serde_json::{json, Map, Value};
use tracing::info;

/// Post-process VMware build artifacts into OVA/OVF exports.
#[derive(Parser)]
#[command(name = "ovaexport")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Strip devices from a VM and export it with ovftool.
    Export {
        #[command(flatten)]
        settings: Settings,

        /// Builder id of the artifact.
        #[arg(long, default_value = SUPPORTED_BUILDERS[0])]
        builder_id: String,

        /// Files making up the artifact. The first .vmx is exported.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Suppress the spinner and tool output.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check a configuration and report every problem found.
    Validate {
        #[command(flatten)]
        settings: Settings,
    },
}

/// Configuration sources, applied in order: files, then variables, then flags.
#[derive(Args)]
struct Settings {
    /// JSON or TOML configuration file. May be repeated; later files win.
    #[arg(short, long = "config", value_name = "FILE")]
    configs: Vec<PathBuf>,

    /// User variable for `{{user `NAME`}}` templates.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Destination path or locator for the export.
    #[arg(short, long)]
    target: Option<String>,

    /// Disk provisioning of the exported image (thick, thin, ...).
    #[arg(long)]
    disk_mode: Option<String>,

    /// Compression level 1-9, or 0 for none.
    #[arg(long)]
    compression: Option<i64>,

    /// Remove the first ethernet adapter before export.
    #[arg(long)]
    remove_ethernet: bool,

    /// Remove the first floppy drive before export.
    #[arg(long)]
    remove_floppy: bool,

    /// Remove the CD/DVD drive's backing file before export.
    #[arg(long)]
    remove_optical_drive: bool,

    /// Path to ovftool, if it isn't on PATH.
    #[arg(long)]
    ovftool: Option<PathBuf>,
}

impl Settings {
    /// Build the configuration fragments handed to the post-processor.
    fn fragments(&self) -> Result<Vec<Value>> {
        let mut fragments = Vec::new();
        for path in &self.configs {
            fragments.push(read_fragment(path)?);
        }

        if !self.vars.is_empty() {
            let vars: Map<String, Value> = self
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            fragments.push(json!({ "packer_user_variables": vars }));
        }

        let mut flags = Map::new();
        if let Some(target) = &self.target {
            flags.insert("target".into(), json!(target));
        }
        if let Some(disk_mode) = &self.disk_mode {
            flags.insert("disk_mode".into(), json!(disk_mode));
        }
        if let Some(compression) = self.compression {
            flags.insert("compression".into(), json!(compression));
        }
        if self.remove_ethernet {
            flags.insert("remove_ethernet".into(), json!(true));
        }
        if self.remove_floppy {
            flags.insert("remove_floppy".into(), json!(true));
        }
        if self.remove_optical_drive {
            flags.insert("remove_optical_drive".into(), json!(true));
        }
        if let Some(ovftool) = &self.ovftool {
            flags.insert("ovftool_path".into(), json!(ovftool.display().to_string()));
        }
        fragments.push(Value::Object(flags));

        Ok(fragments)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            settings,
            builder_id,
            files,
            quiet,
        } => {
            run_export(&settings, builder_id, files, quiet)?;
        }
        Commands::Validate { settings } => {
            run_validate(&settings)?;
        }
    }

    Ok(())
}

fn run_export(settings: &Settings, builder_id: String, files: Vec<PathBuf>, quiet: bool) -> Result<()> {
    let mut pp = OvaExport::new();
    pp.configure(&settings.fragments()?)?;

    let artifact = BuildArtifact::new(builder_id, files);
    info!(?artifact, "starting export");

    let spinner = if quiet {
        None
    } else {
        let sp = ProgressBar::new_spinner();
        sp.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        sp.enable_steady_tick(Duration::from_millis(120));
        Some(sp)
    };

    let ui = SpinnerUi {
        spinner: spinner.as_ref(),
        quiet,
    };
    let outcome = pp.post_process(&ui, artifact);

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    let outcome = outcome?;
    if !quiet {
        if let Some(config) = pp.config() {
            println!("Export completed successfully: {}", config.target);
        }
    }
    info!(is_final = outcome.is_final, "export finished");

    Ok(())
}

fn run_validate(settings: &Settings) -> Result<()> {
    let mut pp = OvaExport::new();
    match pp.configure(&settings.fragments()?) {
        Ok(()) => {
            if let Some(config) = pp.config() {
                println!("Configuration is valid");
                println!("Target:      {}", config.target);
                println!("Disk mode:   {}", config.disk_mode);
                println!("Compression: {}", config.compression);
                println!("ovftool:     {}", config.ovftool.display());
                let devices: Vec<String> = config.devices_to_remove().map(|d| d.to_string()).collect();
                if devices.is_empty() {
                    println!("Remove:      nothing");
                } else {
                    println!("Remove:      {}", devices.join(", "));
                }
            }
            Ok(())
        }
        Err(Error::Validation(errors)) => {
            eprintln!("{}", errors);
            bail!("configuration has {} problem(s)", errors.len())
        }
        Err(other) => Err(other.into()),
    }
}

/// Prints operator messages above the spinner so they aren't overwritten.
struct SpinnerUi<'a> {
    spinner: Option<&'a ProgressBar>,
    quiet: bool,
}

impl Ui for SpinnerUi<'_> {
    fn message(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.spinner {
            Some(sp) => {
                sp.set_message(message.lines().next().unwrap_or_default().to_string());
                sp.println(message);
            }
            None => ConsoleUi.message(message),
        }
    }
}

/// Read a configuration fragment from a JSON or TOML file.
fn read_fragment(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path)),
        Some("json") | None => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path)),
        Some(other) => bail!("Unsupported config format '.{}' for {:?}", other, path),
    }
}

/// Parse a `NAME=VALUE` pair.
fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if name.is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }
    Ok((name.to_string(), value.to_string()))
}
