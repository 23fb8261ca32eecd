//! Integration tests for configuration validation.

use ovaexport_core::{Compression, Config, ConfigError, DiskMode};
use serde_json::json;

fn tool() -> String {
    std::env::current_exe().unwrap().display().to_string()
}

fn has_range_error(errors: &[ConfigError]) -> bool {
    errors
        .iter()
        .any(|e| matches!(e, ConfigError::CompressionRange { .. }))
}

#[test]
fn test_out_of_range_compression_rejected() {
    for level in [-100, -1, 10, 11, 99, i64::from(u32::MAX)] {
        let errs = Config::decode(&[json!({
            "target": "/out/vm.ova",
            "compression": level,
            "ovftool_path": tool(),
        })])
        .expect_err("out-of-range compression should fail");

        assert!(has_range_error(errs.errors()), "level {level} not flagged");
    }
}

#[test]
fn test_oversized_compression_is_a_range_error() {
    for level in [
        json!(u64::MAX),
        json!("99999999999999999999"),
        json!("-99999999999999999999999999999999999999999"),
    ] {
        let errs = Config::decode(&[json!({
            "target": "/out/vm.ova",
            "compression": level,
            "ovftool_path": tool(),
        })])
        .expect_err("oversized compression should fail");

        assert!(has_range_error(errs.errors()), "level {level} not flagged");
        assert!(!errs
            .errors()
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidInteger { .. })));
    }
}

#[test]
fn test_in_range_compression_accepted() {
    for level in 0..=9 {
        let config = Config::decode(&[json!({
            "target": "/out/vm.ova",
            "compression": level,
            "ovftool_path": tool(),
        })])
        .unwrap_or_else(|e| panic!("level {level} rejected: {e}"));

        assert_eq!(i64::from(config.compression.level()), level);
    }
}

#[test]
fn test_missing_target_and_bad_compression_reported_together() {
    let errs = Config::decode(&[json!({"compression": 15, "ovftool_path": tool()})]).unwrap_err();

    assert_eq!(
        errs.errors(),
        &[
            ConfigError::CompressionRange { value: 15 },
            ConfigError::Required { key: "target" },
        ]
    );

    let text = errs.to_string();
    assert!(text.contains("Invalid compression level 15"));
    assert!(text.contains("target must be set"));
}

#[test]
fn test_missing_tool_reported() {
    let errs = Config::decode(&[json!({
        "target": "/out/vm.ova",
        "ovftool_path": "/nonexistent/bin/ovftool",
    })])
    .unwrap_err();

    assert_eq!(errs.len(), 1);
    match &errs.errors()[0] {
        ConfigError::ToolNotFound { tool, .. } => assert_eq!(tool, "/nonexistent/bin/ovftool"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_host_fragments_merge() {
    let config = Config::decode(&[
        json!({
            "packer_build_name": "base",
            "packer_builder_type": "vmware-iso",
            "packer_user_variables": {"version": "1.2.0"},
            "packer_force": true,
        }),
        json!({
            "target": "/exports/{{build_name}}-{{user `version`}}.ova",
            "disk_mode": "thin",
            "compression": "0",
            "remove_ethernet": "true",
            "ovftool_path": tool(),
        }),
    ])
    .unwrap();

    assert_eq!(config.target, "/exports/base-1.2.0.ova");
    assert_eq!(config.disk_mode, DiskMode::Thin);
    assert_eq!(config.compression, Compression::NONE);
    assert!(config.remove_ethernet);
}

#[test]
fn test_empty_input_reports_target() {
    let errs = Config::decode(&[]).unwrap_err();
    assert!(errs
        .iter()
        .any(|e| *e == ConfigError::Required { key: "target" }));
}
