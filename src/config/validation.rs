//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys never break a config.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `PipelineConfig`.
///
/// Maintained by hand to match the structs in `pipeline_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [serial]
        "serial",
        "serial.read_port",
        "serial.write_port",
        "serial.baud_rate",
        "serial.read_timeout_ms",
        // [buffer]
        "buffer",
        "buffer.capacity",
        // [analysis]
        "analysis",
        "analysis.sample_rate_hz",
        "analysis.band_low_hz",
        "analysis.band_high_hz",
        "analysis.filter_order",
        "analysis.min_samples",
        "analysis.window_secs",
        "analysis.search_bandwidth_hz",
        // [session]
        "session",
        "session.poll_interval_ms",
        "session.profile",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Parse errors are left to the serde pass.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed `PipelineConfig`.
///
/// Returns (errors, warnings). Errors are values the pipeline cannot run
/// with; warnings are legal but unusual.
pub fn validate_ranges(config: &super::PipelineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let s = &config.serial;
    if s.read_port.trim().is_empty() {
        errors.push("serial.read_port must not be empty".to_string());
    }
    if s.write_port.trim().is_empty() {
        errors.push("serial.write_port must not be empty".to_string());
    }
    if s.baud_rate == 0 {
        errors.push("serial.baud_rate must be > 0".to_string());
    }
    if s.read_timeout_ms == 0 {
        errors.push("serial.read_timeout_ms must be > 0 (reads would never block)".to_string());
    }
    if !s.read_port.trim().is_empty() && s.read_port == s.write_port {
        warnings.push(ValidationWarning {
            field: "serial.write_port".to_string(),
            message: format!(
                "serial.write_port = '{}' is the same as read_port; the device normally uses two links",
                s.write_port
            ),
            suggestion: None,
        });
    }

    let a = &config.analysis;
    let nyquist = a.sample_rate_hz / 2.0;
    if !a.sample_rate_hz.is_finite() || a.sample_rate_hz <= 0.0 {
        errors.push(format!(
            "analysis.sample_rate_hz = {:.2} must be > 0",
            a.sample_rate_hz
        ));
    } else if !(a.band_low_hz > 0.0 && a.band_low_hz < a.band_high_hz && a.band_high_hz < nyquist) {
        errors.push(format!(
            "analysis band {:.2}-{:.2} Hz must satisfy 0 < low < high < Nyquist ({:.2} Hz)",
            a.band_low_hz, a.band_high_hz, nyquist
        ));
    }
    if a.filter_order == 0 {
        errors.push("analysis.filter_order must be >= 1".to_string());
    } else if a.filter_order > 10 {
        warnings.push(ValidationWarning {
            field: "analysis.filter_order".to_string(),
            message: format!(
                "analysis.filter_order = {} is unusually high; expect numerical ringing",
                a.filter_order
            ),
            suggestion: None,
        });
    }
    if a.min_samples < 2 {
        errors.push(format!(
            "analysis.min_samples = {} must be >= 2",
            a.min_samples
        ));
    }
    if a.window_secs.is_nan() || a.window_secs <= 0.0 {
        errors.push(format!(
            "analysis.window_secs = {:.2} must be > 0",
            a.window_secs
        ));
    }
    if a.search_bandwidth_hz.is_nan() || a.search_bandwidth_hz <= 0.0 {
        errors.push(format!(
            "analysis.search_bandwidth_hz = {:.2} must be > 0",
            a.search_bandwidth_hz
        ));
    }

    let capacity = config.buffer.capacity;
    if capacity == 0 {
        errors.push("buffer.capacity must be > 0".to_string());
    } else if capacity < a.min_samples {
        errors.push(format!(
            "buffer.capacity = {} is below analysis.min_samples = {}; analysis would never run",
            capacity, a.min_samples
        ));
    }

    if config.session.poll_interval_ms == 0 {
        errors.push("session.poll_interval_ms must be > 0".to_string());
    } else if config.session.poll_interval_ms < 100 {
        warnings.push(ValidationWarning {
            field: "session.poll_interval_ms".to_string(),
            message: format!(
                "session.poll_interval_ms = {} polls faster than the analysis window can change",
                config.session.poll_interval_ms
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("capacty", "capacity"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [analysis]
            band_low_hz = 3.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"analysis".to_string()));
        assert!(keys.contains(&"analysis.band_low_hz".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[buffer]\ncapacty = 200\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "buffer.capacty");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("buffer.capacity"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[serial]
read_port = "/dev/ttyUSB0"
baud_rate = 115200

[session]
profile = "severe"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_defaults_clean() {
        let (errors, warnings) = validate_ranges(&PipelineConfig::default());
        assert!(errors.is_empty(), "Defaults should produce no errors: {errors:?}");
        assert!(warnings.is_empty(), "Defaults should produce no warnings: {warnings:?}");
    }

    #[test]
    fn test_band_above_nyquist_is_error() {
        let mut config = PipelineConfig::default();
        config.analysis.band_high_hz = 25.0;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("Nyquist")));
    }

    #[test]
    fn test_capacity_below_min_samples_is_error() {
        let mut config = PipelineConfig::default();
        config.buffer.capacity = 20;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("buffer.capacity")));
    }

    #[test]
    fn test_shared_port_warns() {
        let mut config = PipelineConfig::default();
        config.serial.write_port = config.serial.read_port.clone();
        let (errors, warnings) = validate_ranges(&config);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.field == "serial.write_port"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = PipelineConfig::default();
        config.serial.read_timeout_ms = 0;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("read_timeout_ms")));
    }
}
