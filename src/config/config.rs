use crate::collectors::parse::OutputFormat;
use crate::error::ConfigError;
use crate::significance::CapacityOpeningRule;
use crate::state::{EntityId, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which kind of state is being monitored
    pub domain: Domain,
    /// Treat a missing persisted snapshot as empty instead of failing the run
    pub allow_missing_snapshot: bool,
    pub collector: CollectorConfig,
    pub snapshot: SnapshotConfig,
    pub significance: SignificanceConfig,
    pub dispatch: DispatchConfig,
    pub sinks: SinksConfig,
}

/// Monitored domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// Groups of people currently eligible for vaccination, keyed by group id
    #[default]
    EligibleGroups,
    /// Free appointment counts per vaccination centre
    FreeDates,
}

impl Domain {
    /// Kind of value every entry of this domain carries
    pub fn value_kind(self) -> ValueKind {
        match self {
            Domain::EligibleGroups => ValueKind::Label,
            Domain::FreeDates => ValueKind::Count,
        }
    }
}

/// How the current state is acquired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    /// Run an external scraper and read its stdout
    #[default]
    Command,
    /// Fetch a published JSON mapping
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub kind: CollectorKind,
    /// Program and arguments for the command collector
    pub command: Vec<String>,
    pub format: OutputFormat,
    /// Endpoint for the HTTP collector
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            kind: CollectorKind::Command,
            command: Vec::new(),
            format: OutputFormat::Json,
            url: None,
            timeout_seconds: 120,
        }
    }
}

impl CollectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Local file the snapshot is written to
    pub path: PathBuf,
    /// Published copy the previous snapshot is read from, if any
    pub remote_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/snapshot.json"),
            remote_url: None,
            timeout_seconds: 30,
        }
    }
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Hysteresis applied to count changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    pub capacity_threshold: u64,
    pub min_increase: u64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        let rule = CapacityOpeningRule::default();
        Self {
            capacity_threshold: rule.threshold,
            min_increase: rule.min_increase,
        }
    }
}

impl SignificanceConfig {
    pub fn capacity_rule(&self) -> CapacityOpeningRule {
        CapacityOpeningRule::new(self.capacity_threshold, self.min_increase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound for a single sink; unbounded when absent
    pub sink_timeout_seconds: Option<u64>,
    /// Timeout of the HTTP client shared by the live sinks
    pub http_timeout_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sink_timeout_seconds: None,
            http_timeout_seconds: 30,
        }
    }
}

impl DispatchConfig {
    pub fn sink_timeout(&self) -> Option<Duration> {
        self.sink_timeout_seconds.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Enabled notification sinks; a missing table disables the sink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    pub issue: Option<IssueConfig>,
    pub campaign: Option<CampaignConfig>,
    pub deploy_hook: Option<DeployHookConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueConfig {
    #[serde(default = "default_issue_api_base")]
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Keep the issue body in sync with the current state
    #[serde(default = "default_true")]
    pub summary: bool,
    /// Comment on the issue whenever the state changes
    #[serde(default = "default_true")]
    pub changelog: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub endpoint: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    pub list_ids: Vec<String>,
    #[serde(default)]
    pub sender_id: Option<u64>,
    /// Unsubscribe group per entity id
    #[serde(default)]
    pub suppression_groups: BTreeMap<EntityId, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployHookConfig {
    /// Environment variable holding the hook URL
    #[serde(default = "default_hook_env")]
    pub url_env: String,
}

impl Default for DeployHookConfig {
    fn default() -> Self {
        Self {
            url_env: default_hook_env(),
        }
    }
}

fn default_issue_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_api_key_env() -> String {
    "CAMPAIGN_API_KEY".to_string()
}

fn default_hook_env() -> String {
    "ELIGIBLE_GROUPS_UPDATED_HOOK".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, and a
    /// parse or validation error if its content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.collector.kind {
            CollectorKind::Command if self.collector.command.is_empty() => {
                return Err(ConfigError::MissingValue(
                    "collector.command is required for the command collector".to_string(),
                ));
            }
            CollectorKind::Http if self.collector.url.as_deref().map_or(true, str::is_empty) => {
                return Err(ConfigError::MissingValue(
                    "collector.url is required for the http collector".to_string(),
                ));
            }
            CollectorKind::Http if self.collector.format != OutputFormat::Json => {
                return Err(ConfigError::ValidationError(
                    "the http collector only reads json".to_string(),
                ));
            }
            _ => {}
        }

        if self.collector.format == OutputFormat::FreeDatesText && self.domain != Domain::FreeDates {
            return Err(ConfigError::ValidationError(
                "collector.format 'free-dates-text' requires domain 'free-dates'".to_string(),
            ));
        }

        if self.collector.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "collector.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.snapshot.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "snapshot.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.snapshot.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("snapshot.path".to_string()));
        }

        if self.significance.min_increase == 0 {
            return Err(ConfigError::ValidationError(
                "significance.min_increase must be greater than 0".to_string(),
            ));
        }

        if self.dispatch.sink_timeout_seconds == Some(0) {
            return Err(ConfigError::ValidationError(
                "dispatch.sink_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.dispatch.http_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.http_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(issue) = &self.sinks.issue {
            if issue.owner.is_empty() || issue.repo.is_empty() {
                return Err(ConfigError::MissingValue(
                    "sinks.issue.owner and sinks.issue.repo".to_string(),
                ));
            }
            if issue.number == 0 {
                return Err(ConfigError::ValidationError(
                    "sinks.issue.number must be greater than 0".to_string(),
                ));
            }
        }

        if let Some(campaign) = &self.sinks.campaign {
            if campaign.endpoint.is_empty() {
                return Err(ConfigError::MissingValue("sinks.campaign.endpoint".to_string()));
            }
            if campaign.list_ids.is_empty() {
                return Err(ConfigError::MissingValue("sinks.campaign.list_ids".to_string()));
            }
        }

        Ok(())
    }
}
