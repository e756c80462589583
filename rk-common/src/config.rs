//! Configuration loading and config file resolution
//!
//! rolekeeper is configured by a single TOML bootstrap file. The file names the
//! collection being managed, the tag ids behind every fixed-purpose tag, the
//! label conventions used to discover categories, and the timing knobs for the
//! debounce window and inactivity sweep.
//!
//! # Config file resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `ROLEKEEPER_CONFIG` environment variable
//! 3. `<platform config dir>/rolekeeper/config.toml`
//! 4. `/etc/rolekeeper/config.toml` (Linux only)

use crate::{CollectionId, Error, Result, TagId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable consulted when no CLI path is given
pub const CONFIG_ENV_VAR: &str = "ROLEKEEPER_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Collection (guild) whose tags are managed
    pub collection_id: CollectionId,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Debounce window for toggle bursts
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Label conventions for category discovery
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Tag ids behind the engine's fixed-purpose tags
    #[serde(default)]
    pub tags: TagsConfig,

    /// Tags that may be toggled through the debounce coalescer
    #[serde(default)]
    pub toggles: TogglesConfig,

    /// Inactivity thresholds
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Full reconciliation sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period after the last toggle before a burst is flushed
    #[serde(default = "default_debounce_window_ms")]
    pub window_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: default_debounce_window_ms(),
        }
    }
}

impl DebounceConfig {
    pub fn window(&self) -> Duration {
        crate::time::millis_to_duration(self.window_ms)
    }
}

/// Label conventions used by the category hierarchy resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// A category boundary label starts with this
    #[serde(default = "default_boundary_prefix")]
    pub boundary_prefix: String,

    /// ...and ends with this
    #[serde(default = "default_boundary_suffix")]
    pub boundary_suffix: String,

    /// Exact label of a category's "none held" sentinel
    #[serde(default = "default_sentinel_label")]
    pub sentinel_label: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            boundary_prefix: default_boundary_prefix(),
            boundary_suffix: default_boundary_suffix(),
            sentinel_label: default_sentinel_label(),
        }
    }
}

/// Tag ids for the fixed-purpose tags
///
/// Every entry is optional. Rules that touch an unconfigured tag are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    pub leader: Option<TagId>,
    pub available: Option<TagId>,
    pub available_leader: Option<TagId>,
    pub not_available: Option<TagId>,
    pub inactive: Option<TagId>,
    pub explained_inactive: Option<TagId>,
    pub person: Option<TagId>,
    /// Held by recent joiners; dropped by the full sweep once it expires
    pub newbie: Option<TagId>,

    /// Tracked groups (voice channels), in rule order
    #[serde(default)]
    pub groups: Vec<GroupTagsConfig>,
}

/// Tags belonging to one tracked group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupTagsConfig {
    /// Display name, used only in logs
    pub name: String,
    /// Held while the subject is in the group
    pub member: TagId,
    /// Held while a leader is in the group
    pub leader: Option<TagId>,
    /// Held while an available subject is outside the group
    pub available_not_in: Option<TagId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TogglesConfig {
    /// Tag ids that toggle events may add or remove
    #[serde(default)]
    pub tracked: Vec<TagId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Idle time after which a subject is marked inactive
    #[serde(default = "default_inactive_after_hours")]
    pub inactive_after_hours: u64,

    /// Idle time after which an available subject is marked unavailable
    #[serde(default = "default_unavailable_after_minutes")]
    pub unavailable_after_minutes: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            inactive_after_hours: default_inactive_after_hours(),
            unavailable_after_minutes: default_unavailable_after_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Tags asserted on every subject during a full sweep
    #[serde(default)]
    pub ensure_tags: Vec<TagId>,

    /// Whole days since joining after which the newbie tag is removed
    #[serde(default = "default_newbie_days")]
    pub newbie_days: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            ensure_tags: Vec::new(),
            newbie_days: default_newbie_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_window_ms() -> u64 {
    5000
}

fn default_boundary_prefix() -> String {
    "──╱".to_string()
}

fn default_boundary_suffix() -> String {
    "─".to_string()
}

fn default_sentinel_label() -> String {
    "🚫 none".to_string()
}

fn default_inactive_after_hours() -> u64 {
    6 * 24
}

fn default_unavailable_after_minutes() -> u64 {
    90
}

fn default_newbie_days() -> i64 {
    7
}

impl TomlConfig {
    /// Minimal configuration for a collection, everything else defaulted
    pub fn for_collection(collection_id: CollectionId) -> Self {
        Self {
            collection_id,
            logging: LoggingConfig::default(),
            debounce: DebounceConfig::default(),
            hierarchy: HierarchyConfig::default(),
            tags: TagsConfig::default(),
            toggles: TogglesConfig::default(),
            activity: ActivityConfig::default(),
            sweep: SweepConfig::default(),
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.debounce.window_ms == 0 {
            return Err(Error::Config("debounce.window_ms must be greater than 0".to_string()));
        }
        if self.activity.inactive_after_hours == 0 || self.activity.unavailable_after_minutes == 0 {
            return Err(Error::Config("activity thresholds must be greater than 0".to_string()));
        }
        if self.sweep.newbie_days < 0 {
            return Err(Error::Config("sweep.newbie_days must not be negative".to_string()));
        }

        let t = &self.tags;
        let mut seen = HashSet::new();
        let fixed = [
            ("leader", t.leader),
            ("available", t.available),
            ("available_leader", t.available_leader),
            ("not_available", t.not_available),
            ("inactive", t.inactive),
            ("explained_inactive", t.explained_inactive),
            ("person", t.person),
            ("newbie", t.newbie),
        ];
        let grouped = t.groups.iter().flat_map(|g| {
            [
                ("group member", Some(g.member)),
                ("group leader", g.leader),
                ("group available_not_in", g.available_not_in),
            ]
        });
        for (name, id) in fixed.into_iter().chain(grouped) {
            if let Some(id) = id {
                if !seen.insert(id) {
                    return Err(Error::Config(format!(
                        "tag id {} is assigned to more than one purpose (second use: {})",
                        id, name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolve the config file path
///
/// Returns `Error::Config` if no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("rolekeeper").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
        debug!("No user config at {:?}", path);
    }

    // Priority 4: System-wide config
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/rolekeeper/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!(
        "No config file found. Pass --config or set {}",
        CONFIG_ENV_VAR
    )))
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
