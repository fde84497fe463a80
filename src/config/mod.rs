/// Configuration structures and loading
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{
    CampaignConfig, CollectorConfig, CollectorKind, Config, DeployHookConfig, DispatchConfig,
    Domain, IssueConfig, SignificanceConfig, SinksConfig, SnapshotConfig,
};
