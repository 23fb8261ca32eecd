//! Post-processor configuration.
//!
//! The host hands the post-processor one or more loosely typed JSON
//! fragments. [`Config::decode`] merges them, renders templates, applies
//! defaults and validates the result. Every problem found is collected and
//! reported at once in a [`ValidationErrors`].

use std::collections::HashMap;
use std::fmt;
use std::num::IntErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::strip::Device;
use crate::template::TemplateContext;

/// Name of the conversion tool looked up on `PATH`.
pub const OVFTOOL: &str = "ovftool";

/// Keys the host injects into every fragment that this post-processor ignores.
const HOST_KEYS: &[&str] = &[
    "packer_debug",
    "packer_force",
    "packer_on_error",
    "packer_template_path",
];

/// Disk provisioning of the exported image, as understood by `ovftool --diskMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskMode {
    MonolithicSparse,
    MonolithicFlat,
    TwoGbMaxExtentSparse,
    TwoGbMaxExtentFlat,
    SeSparse,
    EagerZeroedThick,
    #[default]
    Thick,
    Thin,
    Sparse,
    Flat,
}

impl DiskMode {
    pub const ALL: [DiskMode; 10] = [
        DiskMode::MonolithicSparse,
        DiskMode::MonolithicFlat,
        DiskMode::TwoGbMaxExtentSparse,
        DiskMode::TwoGbMaxExtentFlat,
        DiskMode::SeSparse,
        DiskMode::EagerZeroedThick,
        DiskMode::Thick,
        DiskMode::Thin,
        DiskMode::Sparse,
        DiskMode::Flat,
    ];

    /// The value passed to `--diskMode`.
    pub fn as_str(self) -> &'static str {
        match self {
            DiskMode::MonolithicSparse => "monolithicSparse",
            DiskMode::MonolithicFlat => "monolithicFlat",
            DiskMode::TwoGbMaxExtentSparse => "twoGbMaxExtentSparse",
            DiskMode::TwoGbMaxExtentFlat => "twoGbMaxExtentFlat",
            DiskMode::SeSparse => "seSparse",
            DiskMode::EagerZeroedThick => "eagerZeroedThick",
            DiskMode::Thick => "thick",
            DiskMode::Thin => "thin",
            DiskMode::Sparse => "sparse",
            DiskMode::Flat => "flat",
        }
    }
}

impl fmt::Display for DiskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiskMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownDiskMode {
                value: s.to_string(),
            })
    }
}

/// Compression level for the exported image: 1-9, or 0 for none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Compression(u8);

impl Compression {
    pub const NONE: Compression = Compression(0);
    pub const MAX: Compression = Compression(9);

    /// Returns `None` if `level` is outside 0-9.
    pub fn new(level: i64) -> Option<Self> {
        u8::try_from(level)
            .ok()
            .filter(|l| *l <= Self::MAX.0)
            .map(Compression)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn is_uncompressed(self) -> bool {
        self == Self::NONE
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated post-processor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Disk provisioning of the exported image.
    pub disk_mode: DiskMode,
    /// Destination path or locator handed to the conversion tool.
    pub target: String,
    pub remove_ethernet: bool,
    pub remove_floppy: bool,
    pub remove_optical_drive: bool,
    pub compression: Compression,
    /// Resolved path of the conversion tool.
    pub ovftool: PathBuf,
}

impl Config {
    /// Whether `device` should be stripped before conversion.
    pub fn removes(&self, device: Device) -> bool {
        match device {
            Device::Ethernet => self.remove_ethernet,
            Device::Floppy => self.remove_floppy,
            Device::OpticalDrive => self.remove_optical_drive,
        }
    }

    /// Devices to strip, in pipeline order.
    pub fn devices_to_remove(&self) -> impl Iterator<Item = Device> + '_ {
        Device::ALL.into_iter().filter(|d| self.removes(*d))
    }

    /// Decode and validate raw configuration fragments.
    ///
    /// Fragments are merged in order, later keys winning. Omitted options
    /// take their defaults: `disk_mode` = `thick`, removal flags = `false`,
    /// `compression` = 9. `target` is required.
    ///
    /// # Errors
    ///
    /// Returns every violation found, not just the first.
    pub fn decode(raws: &[Value]) -> Result<Config, ValidationErrors> {
        let mut errs = ErrorCollector::default();

        let merged = merge_fragments(raws, &mut errs);
        let raw: RawConfig = match serde_json::from_value(Value::Object(merged)) {
            Ok(raw) => raw,
            Err(e) => {
                errs.push(ConfigError::Malformed {
                    message: e.to_string(),
                });
                RawConfig::default()
            }
        };

        for key in raw.unknown.keys() {
            if !HOST_KEYS.contains(&key.as_str()) {
                errs.push(ConfigError::UnknownKey { key: key.clone() });
            }
        }

        let ctx = template_context(&raw, &mut errs);

        let disk_mode = match errs.check(text_setting(&ctx, "disk_mode", raw.disk_mode.as_ref())) {
            Some(Some(text)) => errs.check(text.parse::<DiskMode>()),
            Some(None) => Some(DiskMode::default()),
            None => None,
        };

        let remove_ethernet = errs
            .check(flag_setting(&ctx, "remove_ethernet", raw.remove_ethernet.as_ref()))
            .map(|flag| flag.unwrap_or(false));
        let remove_floppy = errs
            .check(flag_setting(&ctx, "remove_floppy", raw.remove_floppy.as_ref()))
            .map(|flag| flag.unwrap_or(false));
        let remove_optical_drive = errs
            .check(flag_setting(
                &ctx,
                "remove_optical_drive",
                raw.remove_optical_drive.as_ref(),
            ))
            .map(|flag| flag.unwrap_or(false));

        let compression = match errs.check(compression_setting(&ctx, raw.compression.as_ref())) {
            Some(Some(level)) => errs.check(
                i64::try_from(level)
                    .ok()
                    .and_then(Compression::new)
                    .ok_or(ConfigError::CompressionRange { value: level }),
            ),
            Some(None) => Some(Compression::default()),
            None => None,
        };

        let ovftool = match errs.check(text_setting(&ctx, "ovftool_path", raw.ovftool_path.as_ref())) {
            Some(explicit) => {
                let tool = explicit.unwrap_or_else(|| OVFTOOL.to_string());
                errs.check(which::which(&tool).map_err(|e| ConfigError::ToolNotFound {
                    tool,
                    message: e.to_string(),
                }))
            }
            None => None,
        };

        let target = match errs.check(text_setting(&ctx, "target", raw.target.as_ref())) {
            Some(Some(target)) => Some(target),
            Some(None) => {
                errs.push(ConfigError::Required { key: "target" });
                None
            }
            None => None,
        };

        let (
            Some(disk_mode),
            Some(target),
            Some(remove_ethernet),
            Some(remove_floppy),
            Some(remove_optical_drive),
            Some(compression),
            Some(ovftool),
        ) = (
            disk_mode,
            target,
            remove_ethernet,
            remove_floppy,
            remove_optical_drive,
            compression,
            ovftool,
        )
        else {
            return Err(errs.into_report());
        };

        errs.finish()?;

        Ok(Config {
            disk_mode,
            target,
            remove_ethernet,
            remove_floppy,
            remove_optical_drive,
            compression,
            ovftool,
        })
    }
}

/// A single configuration violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration fragment {index} is not an object")]
    NotAnObject { index: usize },

    #[error("malformed configuration: {message}")]
    Malformed { message: String },

    #[error("unknown configuration key: {key:?}")]
    UnknownKey { key: String },

    #[error("{key}: expected {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("{key}: {message}")]
    Template { key: &'static str, message: String },

    #[error("{key} must be \"true\" or \"false\", got {value:?}")]
    InvalidFlag { key: &'static str, value: String },

    #[error("compression: {value:?} is not an integer")]
    InvalidInteger { value: String },

    #[error("Invalid compression level {value}. Must be between 1 and 9, or 0 for no compression.")]
    CompressionRange { value: i128 },

    #[error("disk_mode: unknown disk mode {value:?}")]
    UnknownDiskMode { value: String },

    #[error("{tool} not found: {message}")]
    ToolNotFound { tool: String, message: String },

    #[error("{key} must be set")]
    Required { key: &'static str },
}

/// Every violation found while validating a configuration, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ConfigError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) occurred:", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n* {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Accumulates violations instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ConfigError>,
}

impl ErrorCollector {
    pub fn push(&mut self, err: ConfigError) {
        self.errors.push(err);
    }

    /// Record the error, if any, and pass the value through.
    pub fn check<T>(&mut self, result: Result<T, ConfigError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` if nothing was collected.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into_report())
        }
    }

    pub fn into_report(self) -> ValidationErrors {
        ValidationErrors(self.errors)
    }
}

/// Shape of the merged fragments before validation.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    disk_mode: Option<Value>,
    target: Option<Value>,
    remove_ethernet: Option<Value>,
    remove_floppy: Option<Value>,
    remove_optical_drive: Option<Value>,
    compression: Option<Value>,
    ovftool_path: Option<Value>,

    packer_build_name: Option<Value>,
    packer_builder_type: Option<Value>,
    packer_user_variables: Option<Value>,

    #[serde(flatten)]
    unknown: Map<String, Value>,
}

fn merge_fragments(raws: &[Value], errs: &mut ErrorCollector) -> Map<String, Value> {
    let mut merged = Map::new();
    for (index, raw) in raws.iter().enumerate() {
        match raw {
            Value::Object(fragment) => {
                for (key, value) in fragment {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            _ => errs.push(ConfigError::NotAnObject { index }),
        }
    }
    merged
}

fn template_context(raw: &RawConfig, errs: &mut ErrorCollector) -> TemplateContext {
    let mut ctx = TemplateContext::default();

    ctx.build_name = errs
        .check(host_string("packer_build_name", raw.packer_build_name.as_ref()))
        .flatten();
    ctx.build_type = errs
        .check(host_string("packer_builder_type", raw.packer_builder_type.as_ref()))
        .flatten();

    match raw.packer_user_variables.as_ref() {
        None => {}
        Some(Value::Object(vars)) => {
            let mut user_variables = HashMap::new();
            for (name, value) in vars {
                match value {
                    Value::String(s) => {
                        user_variables.insert(name.clone(), s.clone());
                    }
                    _ => errs.push(ConfigError::WrongType {
                        key: "packer_user_variables",
                        expected: "an object of strings",
                    }),
                }
            }
            ctx.user_variables = user_variables;
        }
        Some(_) => errs.push(ConfigError::WrongType {
            key: "packer_user_variables",
            expected: "an object of strings",
        }),
    }

    ctx
}

fn host_string(key: &'static str, value: Option<&Value>) -> Result<Option<String>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::WrongType {
            key,
            expected: "a string",
        }),
    }
}

fn render(ctx: &TemplateContext, key: &'static str, text: &str) -> Result<String, ConfigError> {
    ctx.render(text)
        .map_err(|message| ConfigError::Template { key, message })
}

/// A string option. Absent and empty-after-rendering both yield `None`.
fn text_setting(
    ctx: &TemplateContext,
    key: &'static str,
    value: Option<&Value>,
) -> Result<Option<String>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => {
            let rendered = render(ctx, key, s)?;
            Ok((!rendered.is_empty()).then_some(rendered))
        }
        Some(_) => Err(ConfigError::WrongType {
            key,
            expected: "a string",
        }),
    }
}

/// A boolean option given either as a JSON bool or as `"true"`/`"false"`.
fn flag_setting(
    ctx: &TemplateContext,
    key: &'static str,
    value: Option<&Value>,
) -> Result<Option<bool>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match render(ctx, key, s)?.trim() {
            "" => Ok(None),
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(ConfigError::InvalidFlag {
                key,
                value: other.to_string(),
            }),
        },
        Some(_) => Err(ConfigError::WrongType {
            key,
            expected: "a boolean",
        }),
    }
}

/// The compression option given either as a JSON integer or as text.
///
/// Integers too wide for `i128` saturate so they still read as out of range.
fn compression_setting(
    ctx: &TemplateContext,
    value: Option<&Value>,
) -> Result<Option<i128>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidInteger {
                value: n.to_string(),
            }),
        Some(Value::String(s)) => {
            let rendered = render(ctx, "compression", s)?;
            let text = rendered.trim();
            if text.is_empty() {
                return Ok(None);
            }
            match text.parse::<i128>() {
                Ok(level) => Ok(Some(level)),
                Err(e) => match e.kind() {
                    IntErrorKind::PosOverflow => Ok(Some(i128::MAX)),
                    IntErrorKind::NegOverflow => Ok(Some(i128::MIN)),
                    _ => Err(ConfigError::InvalidInteger {
                        value: text.to_string(),
                    }),
                },
            }
        }
        Some(_) => Err(ConfigError::WrongType {
            key: "compression",
            expected: "an integer",
        }),
    }
}
