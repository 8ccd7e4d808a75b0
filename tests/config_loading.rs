//! Config Loading Tests
//!
//! File-based loading, typo detection and range validation of
//! `PipelineConfig`, independent of any serial hardware.

use std::io::Write;

use parkimotion::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use parkimotion::config::{ConfigError, PipelineConfig};
use parkimotion::TherapyProfile;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_full_file() {
    let file = write_config(
        r#"
[serial]
read_port = "/dev/ttyUSB0"
write_port = "/dev/ttyUSB1"
baud_rate = 57600
read_timeout_ms = 250

[buffer]
capacity = 400

[analysis]
band_low_hz = 2.5
band_high_hz = 8.0
min_samples = 64

[session]
poll_interval_ms = 1000
profile = "severe"
"#,
    );

    let config = PipelineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.serial.read_port, "/dev/ttyUSB0");
    assert_eq!(config.serial.write_port, "/dev/ttyUSB1");
    assert_eq!(config.serial.baud_rate, 57_600);
    assert_eq!(config.serial.read_timeout().as_millis(), 250);
    assert_eq!(config.buffer.capacity, 400);
    assert_eq!(config.analysis.band_low_hz, 2.5);
    assert_eq!(config.analysis.sample_rate_hz, 40.0);
    assert_eq!(config.analysis.min_samples, 64);
    assert_eq!(config.session.profile, TherapyProfile::Severe);
    assert_eq!(config.session.poll_interval().as_secs(), 1);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_, _)));
}

#[test]
fn parse_error_names_the_file() {
    let file = write_config("[serial\nread_port = ");
    let err = PipelineConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn unknown_profile_fails_to_parse() {
    let file = write_config("[session]\nprofile = \"extreme\"\n");
    assert!(matches!(
        PipelineConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(_, _))
    ));
}

#[test]
fn buffer_smaller_than_warm_up_is_rejected() {
    let file = write_config("[buffer]\ncapacity = 20\n");
    let err = PipelineConfig::load_from_file(file.path()).unwrap_err();
    let ConfigError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.contains("buffer.capacity")));
}

#[test]
fn typo_is_warned_not_fatal() {
    let text = "[serial]\nread_prot = \"COM3\"\n";
    let warnings = validate_unknown_keys(text);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].field.contains("read_prot"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("serial.read_port"));

    // The typo'd key is ignored and the default kept.
    let config = PipelineConfig::from_toml_str(text).unwrap();
    assert_eq!(config.serial.read_port, "COM6");
}

#[test]
fn every_known_key_round_trips() {
    let text = PipelineConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&text).is_empty());
    let known = known_config_keys();
    assert!(known.contains("analysis.search_bandwidth_hz"));
    assert_eq!(
        suggest_correction("analysis.serch_bandwidth_hz", &known).as_deref(),
        Some("analysis.search_bandwidth_hz")
    );
}
