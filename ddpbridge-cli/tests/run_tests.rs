use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

use ddpbridge_cli::commands::run::{resolve_config, RunOptions};

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("bridge.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_defaults_without_config_file() {
    let config = resolve_config(&RunOptions::default()).unwrap();
    assert_eq!(config.udp_port, 4048);
    assert_eq!(config.baud, 921_600);
    assert_eq!(config.led_count, 43);
    assert!(!config.tweening.tweening_enabled);
}

#[test]
fn test_flags_override_file() {
    let dir = tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
        serial_port = "/dev/ttyACM0"
        udp_port = 5000
        led_count = 60

        [tweening]
        tweening_steps = 8
        "#,
    );

    let options = RunOptions {
        config: Some(path),
        port: Some("/dev/ttyUSB1".to_string()),
        leds: Some(100),
        tweening: true,
        fps: Some(500),
        ..Default::default()
    };
    let config = resolve_config(&options).unwrap();

    assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyUSB1"));
    assert_eq!(config.udp_port, 5000);
    assert_eq!(config.led_count, 100);
    assert!(config.tweening.tweening_enabled);
    assert_eq!(config.tweening.tweening_steps, 8);
    // Out-of-range rates are clamped
    assert_eq!(config.tweening.target_fps, 120);
}

#[test]
fn test_invalid_override_rejected() {
    let options = RunOptions {
        leds: Some(1000),
        ..Default::default()
    };
    assert!(resolve_config(&options).is_err());
}

#[test]
fn test_bad_config_file_rejected() {
    let dir = tempdir().unwrap();
    let path = write_config(&dir, "udp_port = \"not a number\"");

    let options = RunOptions {
        config: Some(path),
        ..Default::default()
    };
    let err = resolve_config(&options).unwrap_err();
    assert!(err.to_string().contains("Failed to load config file"));
}
