//! VMX file reading and writing.
//!
//! A VMX file is a flat list of `key = "value"` lines. VMware treats keys
//! case-insensitively, so [`VmxData`] normalizes every key to lowercase on
//! the way in and writes them back sorted.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Key/value contents of a VMX file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmxData {
    entries: BTreeMap<String, String>,
}

impl VmxData {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Returns the removed keys in sorted order.
    pub fn remove_prefixed(&mut self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_ascii_lowercase();
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();

        for key in &doomed {
            self.entries.remove(key);
        }

        doomed
    }

    /// The VM display name, if set.
    pub fn display_name(&self) -> Option<&str> {
        self.get("displayName")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }

    /// Render the store in VMX syntax.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = \"");
            out.push_str(value);
            out.push_str("\"\n");
        }
        out
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for VmxData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = VmxData::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}

/// Read and parse a VMX file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains a line with an
/// empty key.
pub fn load(path: &Path) -> Result<VmxData> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
    parse(&content)
}

/// Write a VMX file.
pub fn save(path: &Path, data: &VmxData) -> Result<()> {
    replace_contents(path, data.encode().as_bytes())
}

/// Replace the contents of the file at `path`.
///
/// The bytes go to a temporary file next to the real file which is then
/// renamed over it, so readers never see a half-written VMX. Symlinks are
/// followed and an existing file's permissions carry over.
pub fn replace_contents(path: &Path, contents: &[u8]) -> Result<()> {
    let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(e, dir))?;
    tmp.write_all(contents)
        .map_err(|e| Error::io(e, tmp.path()))?;

    if let Ok(meta) = fs::metadata(&path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| Error::io(e, tmp.path()))?;
    }

    tmp.persist(&path).map_err(|e| Error::io(e.error, &path))?;

    Ok(())
}

/// Parse VMX content from a string.
///
/// Handles both quoted and unquoted values:
/// - `key = "value"` -> ("key", "value")
/// - `key = value` -> ("key", "value")
pub fn parse(content: &str) -> Result<VmxData> {
    let mut data = VmxData::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(eq_pos) = line.find('=') else {
            continue;
        };

        let key = line[..eq_pos].trim();
        if key.is_empty() {
            return Err(Error::vmx_parse(format!("line {}: missing key", idx + 1)));
        }

        let value = line[eq_pos + 1..].trim();
        let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            &value[1..value.len() - 1]
        } else {
            value
        };

        data.insert(key, value);
    }

    Ok(data)
}
