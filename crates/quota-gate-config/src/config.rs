// crates/quota-gate-config/src/config.rs
// ============================================================================
// Module: Quota Gate Configuration
// Description: Configuration loading and validation for Quota Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: quota-gate-core, quota-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults matching the published quota posture, so an
//! empty file is valid. Invalid values fail closed: a policy that cannot be
//! evaluated coherently is rejected at load time, never at request time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use quota_gate_core::BreakerPolicy;
use quota_gate_core::CachePolicy;
use quota_gate_core::GovernancePolicy;
use quota_gate_core::LocalOffset;
use quota_gate_core::policy::DEFAULT_BREAKER_BASE_DELAY_MS;
use quota_gate_core::policy::DEFAULT_BREAKER_FAILURE_THRESHOLD;
use quota_gate_core::policy::DEFAULT_BREAKER_MAX_DELAY_MS;
use quota_gate_core::policy::DEFAULT_CACHE_MAX_ENTRIES;
use quota_gate_core::policy::DEFAULT_CACHE_TTL_MS;
use quota_gate_core::policy::DEFAULT_CONFIRMATION_THRESHOLD;
use quota_gate_core::policy::DEFAULT_DAILY_LIMIT;
use quota_gate_core::policy::DEFAULT_DUPLICATE_WINDOW_MS;
use quota_gate_core::policy::DEFAULT_LOCKOUT_MS;
use quota_gate_core::policy::DEFAULT_RAPID_FIRE_LIMIT;
use quota_gate_core::policy::DEFAULT_RAPID_FIRE_WINDOW_MS;
use quota_gate_core::policy::DEFAULT_RECENT_CALLS_CAPACITY;
use quota_gate_core::policy::DEFAULT_SESSION_HARD_LIMIT;
use quota_gate_core::policy::DEFAULT_SESSION_SOFT_LIMIT;
use quota_gate_core::policy::DEFAULT_WARNING_THRESHOLD;
use quota_gate_core::time::MAX_OFFSET_MINUTES;
use quota_gate_store_sqlite::DEFAULT_STORAGE_KEY;
use quota_gate_store_sqlite::SqliteStoreConfig;
use quota_gate_store_sqlite::SqliteStoreMode;
use quota_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "quota-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "QUOTA_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum retained call history.
pub(crate) const MAX_RECENT_CALLS_CAPACITY: usize = 10_000;
/// Maximum time window (one day) for governance windows and lockouts.
pub(crate) const MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1_000;
/// Maximum breaker backoff ceiling.
pub(crate) const MAX_BACKOFF_MS: u64 = 5 * 60 * 1_000;
/// Maximum cache entry bound.
pub(crate) const MAX_CACHE_ENTRIES: usize = 100_000;
/// Default discovery API base URL.
pub(crate) const DEFAULT_UPSTREAM_BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2";
/// Default allowed upstream URL prefix.
pub(crate) const DEFAULT_UPSTREAM_ALLOWED_PREFIX: &str =
    "https://app.ticketmaster.com/discovery/v2/";
/// Default environment variable holding the upstream API key.
pub(crate) const DEFAULT_API_KEY_ENV: &str = "TICKETMASTER_API_KEY";
/// Default upstream connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
/// Default upstream request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Minimum upstream connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum upstream connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum upstream request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum upstream request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Default maximum upstream response size in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
/// Maximum allowed upstream response size in bytes.
pub(crate) const MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;
/// Maximum length of the upstream user agent.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;
/// Maximum search page size accepted upstream.
pub(crate) const MAX_PAGE_SIZE: u32 = 200;
/// Maximum search radius.
pub(crate) const MAX_RADIUS: u32 = 500;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Quota Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaGateConfig {
    /// Quota thresholds and windows.
    #[serde(default)]
    pub governance: GovernanceConfig,
    /// Circuit breaker settings.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upstream discovery API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Default search parameters.
    #[serde(default)]
    pub search: SearchConfig,
    /// Usage ledger storage.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit log routing.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl QuotaGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then [`CONFIG_ENV_VAR`], then
    /// `quota-gate.toml` in the working directory. When neither a path nor
    /// the environment variable is given and the default file is absent, the
    /// built-in defaults are used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            let mut config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.governance.validate()?;
        self.breaker.validate()?;
        self.cache.validate()?;
        self.upstream.validate()?;
        self.search.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Governance
// ============================================================================

/// Quota thresholds and windows.
///
/// # Invariants
/// - `warning_threshold <= confirmation_threshold <= session_soft_limit <= session_hard_limit`.
/// - Windows and the lockout are non-zero and at most one day.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GovernanceConfig {
    /// Calls allowed per local calendar day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u64,
    /// Calls allowed per session.
    #[serde(default = "default_session_hard_limit")]
    pub session_hard_limit: u64,
    /// Session count at which usage is `critical`.
    #[serde(default = "default_session_soft_limit")]
    pub session_soft_limit: u64,
    /// Session count from which each request needs confirmation.
    #[serde(default = "default_confirmation_threshold")]
    pub confirmation_threshold: u64,
    /// Session count at which usage is `warning`.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u64,
    /// Duplicate suppression window in milliseconds.
    #[serde(default = "default_duplicate_window_ms")]
    pub duplicate_window_ms: u64,
    /// Rapid-fire detection window in milliseconds.
    #[serde(default = "default_rapid_fire_window_ms")]
    pub rapid_fire_window_ms: u64,
    /// Calls inside the rapid-fire window that trigger a lockout.
    #[serde(default = "default_rapid_fire_limit")]
    pub rapid_fire_limit: usize,
    /// Lockout duration in milliseconds.
    #[serde(default = "default_lockout_ms")]
    pub lockout_ms: u64,
    /// Maximum retained call records.
    #[serde(default = "default_recent_calls_capacity")]
    pub recent_calls_capacity: usize,
    /// Offset from UTC (minutes) that defines the local calendar day.
    ///
    /// Fixed year-round; daylight saving time is not applied.
    #[serde(default)]
    pub utc_offset_minutes: i16,
    /// Starts every process with a zeroed session counter.
    #[serde(default)]
    pub reset_session_on_start: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            session_hard_limit: default_session_hard_limit(),
            session_soft_limit: default_session_soft_limit(),
            confirmation_threshold: default_confirmation_threshold(),
            warning_threshold: default_warning_threshold(),
            duplicate_window_ms: default_duplicate_window_ms(),
            rapid_fire_window_ms: default_rapid_fire_window_ms(),
            rapid_fire_limit: default_rapid_fire_limit(),
            lockout_ms: default_lockout_ms(),
            recent_calls_capacity: default_recent_calls_capacity(),
            utc_offset_minutes: 0,
            reset_session_on_start: false,
        }
    }
}

impl GovernanceConfig {
    /// Returns the governance policy described by this section.
    #[must_use]
    pub const fn policy(&self) -> GovernancePolicy {
        GovernancePolicy {
            daily_limit: self.daily_limit,
            session_hard_limit: self.session_hard_limit,
            session_soft_limit: self.session_soft_limit,
            confirmation_threshold: self.confirmation_threshold,
            warning_threshold: self.warning_threshold,
            duplicate_window_ms: self.duplicate_window_ms,
            rapid_fire_window_ms: self.rapid_fire_window_ms,
            rapid_fire_limit: self.rapid_fire_limit,
            lockout_ms: self.lockout_ms,
            recent_calls_capacity: self.recent_calls_capacity,
            local_offset: LocalOffset::from_minutes(self.utc_offset_minutes),
        }
    }

    /// Validates governance configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_limit == 0 {
            return Err(ConfigError::Invalid(
                "governance.daily_limit must be greater than zero".to_string(),
            ));
        }
        if self.session_hard_limit == 0 {
            return Err(ConfigError::Invalid(
                "governance.session_hard_limit must be greater than zero".to_string(),
            ));
        }
        if self.warning_threshold > self.confirmation_threshold {
            return Err(ConfigError::Invalid(
                "governance.warning_threshold must not exceed confirmation_threshold".to_string(),
            ));
        }
        if self.confirmation_threshold > self.session_soft_limit {
            return Err(ConfigError::Invalid(
                "governance.confirmation_threshold must not exceed session_soft_limit".to_string(),
            ));
        }
        if self.session_soft_limit > self.session_hard_limit {
            return Err(ConfigError::Invalid(
                "governance.session_soft_limit must not exceed session_hard_limit".to_string(),
            ));
        }
        validate_range("governance.duplicate_window_ms", self.duplicate_window_ms, 1, MAX_WINDOW_MS)?;
        validate_range(
            "governance.rapid_fire_window_ms",
            self.rapid_fire_window_ms,
            1,
            MAX_WINDOW_MS,
        )?;
        validate_range("governance.lockout_ms", self.lockout_ms, 1, MAX_WINDOW_MS)?;
        if self.rapid_fire_limit == 0 {
            return Err(ConfigError::Invalid(
                "governance.rapid_fire_limit must be greater than zero".to_string(),
            ));
        }
        if self.recent_calls_capacity < self.rapid_fire_limit
            || self.recent_calls_capacity > MAX_RECENT_CALLS_CAPACITY
        {
            return Err(ConfigError::Invalid(format!(
                "governance.recent_calls_capacity must be between rapid_fire_limit and \
                 {MAX_RECENT_CALLS_CAPACITY}"
            )));
        }
        if self.utc_offset_minutes.unsigned_abs() > MAX_OFFSET_MINUTES.unsigned_abs() {
            return Err(ConfigError::Invalid(format!(
                "governance.utc_offset_minutes must be within +/-{MAX_OFFSET_MINUTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Breaker
// ============================================================================

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// Consecutive failures at which the breaker trips.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Backoff base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BreakerConfig {
    /// Returns the breaker policy described by this section.
    #[must_use]
    pub const fn policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: self.failure_threshold,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    /// Validates breaker configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker.failure_threshold must be greater than zero".to_string(),
            ));
        }
        validate_range("breaker.base_delay_ms", self.base_delay_ms, 1, MAX_BACKOFF_MS)?;
        validate_range(
            "breaker.max_delay_ms",
            self.max_delay_ms,
            self.base_delay_ms,
            MAX_BACKOFF_MS,
        )?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Response cache settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entry lifetime in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
    /// Maximum cached responses.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Returns the cache policy described by this section.
    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        CachePolicy {
            ttl_ms: self.ttl_ms,
            max_entries: Some(self.max_entries),
        }
    }

    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("cache.ttl_ms", self.ttl_ms, 1, MAX_WINDOW_MS)?;
        if self.max_entries == 0 || self.max_entries > MAX_CACHE_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "cache.max_entries must be between 1 and {MAX_CACHE_ENTRIES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Upstream
// ============================================================================

/// Upstream discovery API settings.
///
/// # Invariants
/// - `base_url` followed by `/` starts with `allowed_prefix`.
/// - The API key is never serialized.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Discovery API base URL.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Prefix every dispatched URL must start with.
    #[serde(default = "default_upstream_allowed_prefix")]
    pub allowed_prefix: String,
    /// Inline API key (prefer `api_key_env`).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum accepted response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            allowed_prefix: default_upstream_allowed_prefix(),
            api_key: None,
            api_key_env: default_api_key_env(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    /// Resolves the API key from the inline value or the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no key is available.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        match env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::Invalid(format!(
                "upstream api key missing: set upstream.api_key or ${}",
                self.api_key_env
            ))),
        }
    }

    /// Validates upstream configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "upstream.base_url must be an http(s) url".to_string(),
            ));
        }
        if self.allowed_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "upstream.allowed_prefix must be non-empty".to_string(),
            ));
        }
        let normalized = format!("{}/", base.trim_end_matches('/'));
        if !normalized.starts_with(&self.allowed_prefix) {
            return Err(ConfigError::Invalid(
                "upstream.base_url must start with upstream.allowed_prefix".to_string(),
            ));
        }
        if self.api_key.as_ref().is_some_and(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("upstream.api_key must be non-empty".to_string()));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.api_key_env must be non-empty".to_string()));
        }
        validate_range(
            "upstream.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_range(
            "upstream.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "upstream.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES}"
            )));
        }
        if self.user_agent.trim().is_empty() || self.user_agent.len() > MAX_USER_AGENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "upstream.user_agent must be 1..={MAX_USER_AGENT_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Search Defaults
// ============================================================================

/// Distance unit for radius searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    /// Statute miles.
    #[default]
    Miles,
    /// Kilometers.
    Km,
}

impl DistanceUnit {
    /// Returns the upstream query value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Miles => "miles",
            Self::Km => "km",
        }
    }
}

/// Default parameters injected into every event search.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Classification filter.
    #[serde(default = "default_classification_name")]
    pub classification_name: String,
    /// Genre filter.
    #[serde(default = "default_genre_id")]
    pub genre_id: String,
    /// Result ordering.
    #[serde(default = "default_sort")]
    pub sort: String,
    /// Results per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Default search radius.
    #[serde(default = "default_radius")]
    pub radius: u32,
    /// Radius unit.
    #[serde(default)]
    pub unit: DistanceUnit,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            classification_name: default_classification_name(),
            genre_id: default_genre_id(),
            sort: default_sort(),
            page_size: default_page_size(),
            radius: default_radius(),
            unit: DistanceUnit::default(),
        }
    }
}

impl SearchConfig {
    /// Validates search defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("search.classification_name", &self.classification_name),
            ("search.genre_id", &self.genre_id),
            ("search.sort", &self.sort),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
            }
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "search.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.radius == 0 || self.radius > MAX_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "search.radius must be between 1 and {MAX_RADIUS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Ledger store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Keep the ledger in memory for the process lifetime.
    #[default]
    Memory,
    /// Persist the ledger in `SQLite`.
    Sqlite,
}

/// Usage ledger storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Key of the ledger record.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            storage_key: default_storage_key(),
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store_type != StoreType::Sqlite {
            return None;
        }
        let path = self.path.clone()?;
        Some(SqliteStoreConfig {
            path,
            storage_key: self.storage_key.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        })
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("store.storage_key must be non-empty".to_string()));
        }
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path("store.path", path)
            }
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit log routing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path when the file sink is selected.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => validate_store_path("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// The flag is true when the path was requested explicitly.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates store and log paths against length limits.
fn validate_store_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a numeric value against inclusive bounds.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Default daily limit.
const fn default_daily_limit() -> u64 {
    DEFAULT_DAILY_LIMIT
}

/// Default session hard limit.
const fn default_session_hard_limit() -> u64 {
    DEFAULT_SESSION_HARD_LIMIT
}

/// Default session soft limit.
const fn default_session_soft_limit() -> u64 {
    DEFAULT_SESSION_SOFT_LIMIT
}

/// Default confirmation threshold.
const fn default_confirmation_threshold() -> u64 {
    DEFAULT_CONFIRMATION_THRESHOLD
}

/// Default warning threshold.
const fn default_warning_threshold() -> u64 {
    DEFAULT_WARNING_THRESHOLD
}

/// Default duplicate window.
const fn default_duplicate_window_ms() -> u64 {
    DEFAULT_DUPLICATE_WINDOW_MS
}

/// Default rapid-fire window.
const fn default_rapid_fire_window_ms() -> u64 {
    DEFAULT_RAPID_FIRE_WINDOW_MS
}

/// Default rapid-fire limit.
const fn default_rapid_fire_limit() -> usize {
    DEFAULT_RAPID_FIRE_LIMIT
}

/// Default lockout duration.
const fn default_lockout_ms() -> u64 {
    DEFAULT_LOCKOUT_MS
}

/// Default recent call capacity.
const fn default_recent_calls_capacity() -> usize {
    DEFAULT_RECENT_CALLS_CAPACITY
}

/// Default breaker threshold.
const fn default_failure_threshold() -> u32 {
    DEFAULT_BREAKER_FAILURE_THRESHOLD
}

/// Default breaker base delay.
const fn default_base_delay_ms() -> u64 {
    DEFAULT_BREAKER_BASE_DELAY_MS
}

/// Default breaker ceiling.
const fn default_max_delay_ms() -> u64 {
    DEFAULT_BREAKER_MAX_DELAY_MS
}

/// Default cache TTL.
const fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

/// Default cache bound.
const fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

/// Default upstream base URL.
fn default_upstream_base_url() -> String {
    DEFAULT_UPSTREAM_BASE_URL.to_string()
}

/// Default allowed upstream prefix.
fn default_upstream_allowed_prefix() -> String {
    DEFAULT_UPSTREAM_ALLOWED_PREFIX.to_string()
}

/// Default API key environment variable.
fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default response size limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default user agent.
fn default_user_agent() -> String {
    format!("quota-gate/{}", env!("CARGO_PKG_VERSION"))
}

/// Default classification filter.
fn default_classification_name() -> String {
    "music".to_string()
}

/// Default genre filter (blues).
fn default_genre_id() -> String {
    "KnvZfZ7vAvd".to_string()
}

/// Default result ordering.
fn default_sort() -> String {
    "date,asc".to_string()
}

/// Default page size.
const fn default_page_size() -> u32 {
    20
}

/// Default radius.
const fn default_radius() -> u32 {
    25
}

/// Default ledger record key.
fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn validate_range_accepts_exact_boundaries() {
        assert!(validate_range("test", 100, 100, 1000).is_ok());
        assert!(validate_range("test", 1000, 100, 1000).is_ok());
        assert!(validate_range("test", 99, 100, 1000).is_err());
        assert!(validate_range("test", 1001, 100, 1000).is_err());
    }

    #[test]
    fn validate_range_error_includes_field_name() {
        let err = validate_range("my_custom_field", 0, 1, 2).unwrap_err();
        assert!(err.to_string().contains("my_custom_field"));
    }

    #[test]
    fn validate_store_path_rejects_component_too_long() {
        let long_component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let path = PathBuf::from(format!("./{long_component}"));
        let err = validate_store_path("store.path", &path).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }

    #[test]
    fn resolve_path_prefers_explicit_path() {
        let (path, explicit) = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom.toml"));
        assert!(explicit);
    }
}
