use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GateError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    let admission = &cfg.admission;

    if !admission.requests_per_second.is_finite() || admission.requests_per_second <= 0.0 {
        return Err(GateError::Config(format!(
            "admission.requests_per_second must be a positive number, got {}",
            admission.requests_per_second
        )));
    }

    if admission.burst == 0 {
        return Err(GateError::Config(
            "admission.burst must be at least 1".to_string(),
        ));
    }

    if admission.sweep_interval_secs == 0 {
        return Err(GateError::Config(
            "admission.sweep_interval_secs must be at least 1".to_string(),
        ));
    }

    if admission.retention_secs < admission.sweep_interval_secs {
        return Err(GateError::Config(format!(
            "admission.retention_secs ({}) must not be shorter than admission.sweep_interval_secs ({})",
            admission.retention_secs, admission.sweep_interval_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_config("listen = \"127.0.0.1:4000\"\n");

        let cfg = load_from_path(file.path()).expect("config should load");
        assert!(cfg.admission.enabled);
        assert_eq!(cfg.admission.requests_per_second, 2.0);
        assert_eq!(cfg.admission.burst, 4);
        assert_eq!(cfg.admission.sweep_interval_secs, 60);
        assert_eq!(cfg.admission.retention_secs, 180);
        assert_eq!(cfg.timeout.shutdown_secs, 30);
        assert_eq!(cfg.telemetry.metrics_port, None);
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"
listen = "0.0.0.0:4000"

[admission]
enabled = true
requests_per_second = 0.5
burst = 10
sweep_interval_secs = 30
retention_secs = 90

[logging]
level = "debug"
show_target = true

[telemetry]
metrics_port = 9090

[timeout]
shutdown_secs = 5
"#,
        );

        let cfg = load_from_path(file.path()).expect("config should load");
        assert_eq!(cfg.admission.requests_per_second, 0.5);
        assert_eq!(cfg.admission.burst, 10);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.telemetry.metrics_port, Some(9090));
        assert_eq!(cfg.timeout.shutdown_secs, 5);
    }

    #[test]
    fn rejects_non_positive_rate() {
        let file = write_config(
            "listen = \"127.0.0.1:4000\"\n[admission]\nrequests_per_second = 0.0\n",
        );

        let err = load_from_path(file.path()).expect_err("zero rate should be rejected");
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn rejects_zero_burst() {
        let file = write_config("listen = \"127.0.0.1:4000\"\n[admission]\nburst = 0\n");

        let err = load_from_path(file.path()).expect_err("zero burst should be rejected");
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn rejects_retention_shorter_than_sweep_interval() {
        let file = write_config(
            "listen = \"127.0.0.1:4000\"\n[admission]\nsweep_interval_secs = 60\nretention_secs = 30\n",
        );

        let err = load_from_path(file.path()).expect_err("short retention should be rejected");
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_path("/nonexistent/floodgate.toml")
            .expect_err("missing file should be an error");
        assert!(matches!(err, GateError::Config(_)));
    }
}
