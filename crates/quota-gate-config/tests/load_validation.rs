//! Config load validation tests for quota-gate-config.
// crates/quota-gate-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

#![allow(clippy::use_debug, reason = "Test failure messages include debug output.")]

use std::io::Write;
use std::path::Path;

use quota_gate_config::ConfigError;
use quota_gate_config::QuotaGateConfig;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<QuotaGateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(QuotaGateConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(QuotaGateConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_missing_explicit_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(QuotaGateConfig::load(Some(&path)), "config io error")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(QuotaGateConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(QuotaGateConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let file = write_config("[governance\ndaily_limit = 1")?;
    assert_invalid(QuotaGateConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn load_rejects_unknown_enum_values() -> TestResult {
    let file = write_config("[store]\ntype = \"postgres\"\n")?;
    assert_invalid(QuotaGateConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn load_empty_file_yields_defaults() -> TestResult {
    let file = write_config("")?;
    let config = QuotaGateConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let policy = config.governance.policy();
    if policy.daily_limit != 5_000 || policy.session_hard_limit != 100 {
        return Err(format!("unexpected default limits: {policy:?}"));
    }
    if policy.confirmation_threshold != 50 || policy.warning_threshold != 25 {
        return Err(format!("unexpected default thresholds: {policy:?}"));
    }
    if config.search.classification_name != "music" || config.search.genre_id != "KnvZfZ7vAvd" {
        return Err("unexpected default search filters".to_string());
    }
    if config.store.sqlite_config().is_some() {
        return Err("default store should be in-memory".to_string());
    }
    Ok(())
}

#[test]
fn load_reads_overrides() -> TestResult {
    let file = write_config(
        r#"
[governance]
daily_limit = 1000
session_hard_limit = 40
session_soft_limit = 30
confirmation_threshold = 20
warning_threshold = 10
utc_offset_minutes = -300

[cache]
ttl_ms = 60000
max_entries = 8

[search]
radius = 50
unit = "km"

[store]
type = "sqlite"
path = "state/usage.sqlite"
storage_key = "blues"
"#,
    )?;
    let config = QuotaGateConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let policy = config.governance.policy();
    if policy.daily_limit != 1_000 || policy.local_offset.minutes() != -300 {
        return Err(format!("governance overrides not applied: {policy:?}"));
    }
    let cache = config.cache.policy();
    if cache.ttl_ms != 60_000 || cache.max_entries != Some(8) {
        return Err(format!("cache overrides not applied: {cache:?}"));
    }
    if config.search.radius != 50 || config.search.unit.as_str() != "km" {
        return Err("search overrides not applied".to_string());
    }
    let sqlite = config.store.sqlite_config().ok_or("sqlite config missing")?;
    if sqlite.storage_key != "blues" || !sqlite.path.ends_with("usage.sqlite") {
        return Err("store overrides not applied".to_string());
    }
    Ok(())
}
