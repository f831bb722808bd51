use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::page::KeyChord;
use crate::status::{MatchPolicy, TargetSet};

/// Errors produced when settings cannot describe a usable watcher
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// No non-blank target status remains after normalization
    #[error("target status set is empty")]
    EmptyTargetSet,

    /// A selector list that must have at least one entry is empty
    #[error("selector list `{field}` is empty")]
    EmptySelectors { field: &'static str },

    /// A duration that must be positive is zero
    #[error("`{field}` must be greater than zero")]
    InvalidDuration { field: &'static str },

    /// Row status changes would never reach the rows observer
    #[error("`row_attribute_filter` does not include `{attribute}`")]
    UnobservedStatusAttribute { attribute: String },
}

/// Watcher settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Status values that count as "success" (normalized on load)
    #[serde(default = "default_target_statuses")]
    pub target_statuses: Vec<String>,

    /// How an observed status is compared against the target set
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Query resolving the single status element on the detail view
    #[serde(default = "default_detail_selector")]
    pub detail_selector: String,

    /// Alternative queries identifying row status controls
    #[serde(default = "default_row_selectors")]
    pub row_selectors: Vec<String>,

    /// Nested elements tried, in order, when a row control has no parseable label
    #[serde(default = "default_status_text_selectors")]
    pub status_text_selectors: Vec<String>,

    /// Attribute holding the structured status label on row controls
    #[serde(default = "default_status_attribute")]
    pub status_attribute: String,

    /// Attribute names whose changes count as row mutations
    #[serde(default = "default_row_attribute_filter")]
    pub row_attribute_filter: Vec<String>,

    /// Timer settings
    #[serde(default)]
    pub timing: TimingSettings,

    /// Key chord forcing one effect dispatch for smoke tests
    #[serde(default = "default_manual_trigger")]
    pub manual_trigger: KeyChord,

    /// Verbose diagnostic logging
    #[serde(default)]
    pub debug: bool,
}

fn default_target_statuses() -> Vec<String> {
    vec!["dev complete".to_string(), "done".to_string()]
}

fn default_detail_selector() -> String {
    r"button#issue\.fields\.status-view\.status-button > span:nth-of-type(1)".to_string()
}

fn default_row_selectors() -> Vec<String> {
    [
        r#"button[aria-label$="Change status"]"#,
        r#"button[aria-label*="Change status"]"#,
        r#"[role="button"][aria-label$="Change status"]"#,
        r#"[role="button"][aria-label*="Change status"]"#,
        r#"td [role="button"][aria-label*="Change status"]"#,
        r#"td button[aria-label*="Change status"]"#,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_status_text_selectors() -> Vec<String> {
    vec![r#"[data-testid*="status"]"#.to_string(), "span,div".to_string()]
}

fn default_status_attribute() -> String {
    "aria-label".to_string()
}

fn default_row_attribute_filter() -> Vec<String> {
    vec![
        "aria-label".to_string(),
        "aria-pressed".to_string(),
        "class".to_string(),
    ]
}

fn default_manual_trigger() -> KeyChord {
    KeyChord {
        code: "KeyJ".to_string(),
        alt: true,
        shift: true,
        ctrl: false,
        meta: false,
    }
}

/// Timer settings, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Settling window before a newly seen entity may fire
    #[serde(default = "default_arm_delay")]
    pub arm_delay_ms: u64,

    /// Global grace period after watcher startup
    #[serde(default = "default_boot_deadzone")]
    pub boot_deadzone_ms: u64,

    /// Delay before re-reading a clicked row control
    #[serde(default = "default_click_settle")]
    pub click_settle_ms: u64,

    /// Location polling interval
    #[serde(default = "default_route_poll")]
    pub route_poll_ms: u64,

    /// Delay between teardown and rebinding after a location change
    #[serde(default = "default_rebind_delay")]
    pub rebind_delay_ms: u64,

    /// Delay between binding retries while a surface is still unbound
    #[serde(default = "default_init_retry")]
    pub init_retry_ms: u64,

    /// Maximum number of binding retries after startup or a rebind
    #[serde(default = "default_init_retry_limit")]
    pub init_retry_limit: u32,
}

fn default_arm_delay() -> u64 {
    900
}

fn default_boot_deadzone() -> u64 {
    1200
}

fn default_click_settle() -> u64 {
    250
}

fn default_route_poll() -> u64 {
    400
}

fn default_rebind_delay() -> u64 {
    600
}

fn default_init_retry() -> u64 {
    600
}

fn default_init_retry_limit() -> u32 {
    5
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            arm_delay_ms: default_arm_delay(),
            boot_deadzone_ms: default_boot_deadzone(),
            click_settle_ms: default_click_settle(),
            route_poll_ms: default_route_poll(),
            rebind_delay_ms: default_rebind_delay(),
            init_retry_ms: default_init_retry(),
            init_retry_limit: default_init_retry_limit(),
        }
    }
}

impl TimingSettings {
    pub fn arm_delay(&self) -> Duration {
        Duration::from_millis(self.arm_delay_ms)
    }

    pub fn boot_deadzone(&self) -> Duration {
        Duration::from_millis(self.boot_deadzone_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn route_poll(&self) -> Duration {
        Duration::from_millis(self.route_poll_ms)
    }

    pub fn rebind_delay(&self) -> Duration {
        Duration::from_millis(self.rebind_delay_ms)
    }

    pub fn init_retry(&self) -> Duration {
        Duration::from_millis(self.init_retry_ms)
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            target_statuses: default_target_statuses(),
            match_policy: MatchPolicy::default(),
            detail_selector: default_detail_selector(),
            row_selectors: default_row_selectors(),
            status_text_selectors: default_status_text_selectors(),
            status_attribute: default_status_attribute(),
            row_attribute_filter: default_row_attribute_filter(),
            timing: TimingSettings::default(),
            manual_trigger: default_manual_trigger(),
            debug: false,
        }
    }
}

impl WatcherSettings {
    /// Load settings from a config file
    ///
    /// Tries the explicit path first, then the default locations. Returns
    /// defaults when no config file exists.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("juicer/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/juicer/config.toml")),
            dirs::home_dir().map(|p| p.join(".juicer.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        Ok(Self::default())
    }

    /// Normalize and repair values that would leave the watcher unusable
    pub fn validate(&mut self) {
        self.target_statuses = self
            .target_statuses
            .iter()
            .map(|s| crate::status::normalize(Some(s)))
            .filter(|s| !s.is_empty())
            .collect();
        if self.target_statuses.is_empty() {
            tracing::warn!("No usable target statuses configured, using defaults");
            self.target_statuses = default_target_statuses();
        }

        self.row_selectors.retain(|s| !s.trim().is_empty());
        if self.row_selectors.is_empty() {
            self.row_selectors = default_row_selectors();
        }
        if self.detail_selector.trim().is_empty() {
            self.detail_selector = default_detail_selector();
        }
        if self.status_attribute.trim().is_empty() {
            self.status_attribute = default_status_attribute();
        }
        self.row_attribute_filter.retain(|a| !a.trim().is_empty());
        if self.row_attribute_filter.is_empty() {
            self.row_attribute_filter = default_row_attribute_filter();
        }
        if !self.row_attribute_filter.contains(&self.status_attribute) {
            tracing::warn!(
                "row_attribute_filter misses {}, adding it",
                self.status_attribute
            );
            self.row_attribute_filter.push(self.status_attribute.clone());
        }

        // A zero interval would spin the location poller.
        if self.timing.route_poll_ms == 0 {
            self.timing.route_poll_ms = default_route_poll();
        }
    }

    /// Build the target set described by these settings
    pub fn target_set(&self) -> Result<TargetSet, SettingsError> {
        let set = TargetSet::new(self.target_statuses.iter(), self.match_policy);
        if set.is_empty() {
            return Err(SettingsError::EmptyTargetSet);
        }
        Ok(set)
    }

    /// Check the invariants the watcher relies on without repairing them
    pub fn check(&self) -> Result<(), SettingsError> {
        self.target_set()?;
        if self.row_selectors.is_empty() {
            return Err(SettingsError::EmptySelectors {
                field: "row_selectors",
            });
        }
        if self.row_attribute_filter.is_empty() {
            return Err(SettingsError::EmptySelectors {
                field: "row_attribute_filter",
            });
        }
        if !self.row_attribute_filter.contains(&self.status_attribute) {
            return Err(SettingsError::UnobservedStatusAttribute {
                attribute: self.status_attribute.clone(),
            });
        }
        if self.timing.route_poll_ms == 0 {
            return Err(SettingsError::InvalidDuration {
                field: "route_poll_ms",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = WatcherSettings::default();
        assert_eq!(settings.target_statuses, vec!["dev complete", "done"]);
        assert_eq!(settings.match_policy, MatchPolicy::Contains);
        assert_eq!(settings.row_selectors.len(), 6);
        assert_eq!(settings.timing.arm_delay_ms, 900);
        assert_eq!(settings.timing.boot_deadzone_ms, 1200);
        assert_eq!(settings.timing.click_settle_ms, 250);
        assert_eq!(settings.timing.route_poll_ms, 400);
        assert_eq!(settings.timing.rebind_delay_ms, 600);
        assert!(settings.manual_trigger.alt && settings.manual_trigger.shift);
        assert!(settings.check().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_field_defaults() {
        let settings: WatcherSettings = toml::from_str(
            r#"
target_statuses = ["Shipped"]
match_policy = "exact"

[timing]
arm_delay_ms = 50
"#,
        )
        .unwrap();

        assert_eq!(settings.target_statuses, vec!["Shipped"]);
        assert_eq!(settings.match_policy, MatchPolicy::Exact);
        assert_eq!(settings.timing.arm_delay_ms, 50);
        assert_eq!(settings.timing.boot_deadzone_ms, 1200);
        assert_eq!(settings.status_attribute, "aria-label");
    }

    #[test]
    fn test_validate_normalizes_targets() {
        let mut settings = WatcherSettings {
            target_statuses: vec!["  Done ".to_string(), "   ".to_string()],
            ..Default::default()
        };
        settings.validate();
        assert_eq!(settings.target_statuses, vec!["done"]);
    }

    #[test]
    fn test_validate_restores_empty_collections() {
        let mut settings = WatcherSettings {
            target_statuses: vec![" ".to_string()],
            row_selectors: vec![],
            ..Default::default()
        };
        settings.timing.route_poll_ms = 0;
        settings.validate();
        assert_eq!(settings.target_statuses, default_target_statuses());
        assert_eq!(settings.row_selectors, default_row_selectors());
        assert_eq!(settings.timing.route_poll_ms, 400);
    }

    #[test]
    fn test_check_rejects_blank_targets() {
        let settings = WatcherSettings {
            target_statuses: vec!["".to_string()],
            ..Default::default()
        };
        assert_eq!(settings.check(), Err(SettingsError::EmptyTargetSet));
    }

    #[test]
    fn test_check_rejects_empty_row_selectors() {
        let settings = WatcherSettings {
            row_selectors: vec![],
            ..Default::default()
        };
        assert_eq!(
            settings.check(),
            Err(SettingsError::EmptySelectors {
                field: "row_selectors"
            })
        );
    }

    #[test]
    fn test_validate_restores_row_attribute_filter() {
        let mut settings = WatcherSettings {
            row_attribute_filter: vec![],
            ..Default::default()
        };
        settings.validate();
        assert_eq!(settings.row_attribute_filter, default_row_attribute_filter());

        let mut settings = WatcherSettings {
            status_attribute: "title".to_string(),
            ..Default::default()
        };
        settings.validate();
        assert!(settings.row_attribute_filter.contains(&"title".to_string()));
        assert_eq!(settings.check(), Ok(()));
    }

    #[test]
    fn test_check_rejects_unobserved_status_attribute() {
        let settings = WatcherSettings {
            row_attribute_filter: vec![],
            ..Default::default()
        };
        assert_eq!(
            settings.check(),
            Err(SettingsError::EmptySelectors {
                field: "row_attribute_filter"
            })
        );

        let settings = WatcherSettings {
            row_attribute_filter: vec!["class".to_string()],
            ..Default::default()
        };
        assert_eq!(
            settings.check(),
            Err(SettingsError::UnobservedStatusAttribute {
                attribute: "aria-label".to_string()
            })
        );
    }

    #[test]
    fn test_check_rejects_zero_route_poll() {
        let mut settings = WatcherSettings::default();
        settings.timing.route_poll_ms = 0;
        assert_eq!(
            settings.check(),
            Err(SettingsError::InvalidDuration {
                field: "route_poll_ms"
            })
        );
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debug = true\n[timing]\nclick_settle_ms = 10\n").unwrap();

        let settings = WatcherSettings::load(Some(&path)).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.timing.click_settle_ms, 10);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml ][[[").unwrap();
        assert!(WatcherSettings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_timing_durations() {
        let timing = TimingSettings::default();
        assert_eq!(timing.arm_delay(), Duration::from_millis(900));
        assert_eq!(timing.rebind_delay(), Duration::from_millis(600));
    }
}
