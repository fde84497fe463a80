use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vax_notify::collectors::{Collector, CommandCollector, HttpCollector};
use vax_notify::config::{CollectorKind, Config, SinksConfig};
use vax_notify::error::{ConfigError, PipelineError};
use vax_notify::sinks::{
    CampaignSettings, CampaignSink, ChangelogSink, DeployHookSink, HttpTransport, IssueSummarySink,
    IssueTarget, LogTransport, Sink, Transport,
};
use vax_notify::store::{FileSnapshotStore, RemoteSnapshotStore, SnapshotStore};
use vax_notify::{FanoutDispatcher, Pipeline, PipelineOptions, SelectionMode, SignificancePolicy};

/// Command-line arguments for the vaccination availability notifier
#[derive(Parser)]
#[command(
    name = "vax-notify",
    about = "Detects changes in vaccination availability and notifies subscribers",
    long_about = "Observes the current state of a vaccination source, compares it with the \
                  previously persisted snapshot, persists the new state and notifies every \
                  configured channel about significant changes."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log outbound requests instead of sending them
    #[arg(long, help = "Dry run: log notifications instead of sending them")]
    dry: bool,

    /// Notify about every current entry, not only significant changes
    #[arg(
        long,
        help = "Notify about every current entry even if nothing changed significantly"
    )]
    notify_no_dates: bool,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn options(&self, config: &Config) -> PipelineOptions {
        PipelineOptions {
            mode: if self.notify_no_dates {
                SelectionMode::AllEntries
            } else {
                SelectionMode::SignificantChanges
            },
            allow_missing_snapshot: config.allow_missing_snapshot,
        }
    }
}

/// Load configuration from the given path
///
/// A missing or unreadable file falls back to defaults; a file that exists
/// but is invalid is an error.
fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => return Ok(config),
                Err(ConfigError::ReadError(e)) => {
                    warn!("Configuration file not found or unreadable ({}), using defaults", e);
                    Config::default()
                }
                Err(e) => return Err(e),
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    config.validate()?;
    Ok(config)
}

/// Read a credential from the environment, treating empty values as unset
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn build_collector(config: &Config) -> anyhow::Result<Arc<dyn Collector>> {
    let kind = config.domain.value_kind();
    let timeout = config.collector.timeout();

    let collector: Arc<dyn Collector> = match config.collector.kind {
        CollectorKind::Command => Arc::new(CommandCollector::new(
            &config.collector.command,
            config.collector.format,
            kind,
            timeout,
        )?),
        CollectorKind::Http => {
            let url = config
                .collector
                .url
                .clone()
                .ok_or_else(|| ConfigError::MissingValue("collector.url".to_string()))?;
            Arc::new(HttpCollector::new(url, kind, timeout)?)
        }
    };

    Ok(collector)
}

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    let local = FileSnapshotStore::new(config.snapshot.path.clone());

    let store: Arc<dyn SnapshotStore> = match &config.snapshot.remote_url {
        Some(url) => Arc::new(RemoteSnapshotStore::new(
            url.clone(),
            local,
            config.snapshot.timeout(),
        )?),
        None => Arc::new(local),
    };

    Ok(store)
}

fn build_transport(config: &Config, dry: bool) -> anyhow::Result<Arc<dyn Transport>> {
    if dry {
        info!("Dry run: notifications are logged, not sent");
        return Ok(Arc::new(LogTransport));
    }
    Ok(Arc::new(HttpTransport::new(config.dispatch.http_timeout())?))
}

/// Construct every configured sink around the shared transport
fn build_sinks(sinks: &SinksConfig, transport: Arc<dyn Transport>) -> Vec<Arc<dyn Sink>> {
    let mut built: Vec<Arc<dyn Sink>> = Vec::new();

    if let Some(issue) = &sinks.issue {
        let target = IssueTarget {
            api_base: issue.api_base.clone(),
            owner: issue.owner.clone(),
            repo: issue.repo.clone(),
            number: issue.number,
            token: env_value(&issue.token_env),
        };
        if target.token.is_none() && transport.is_live() {
            warn!("{} is not set, issue requests are unauthenticated", issue.token_env);
        }

        if issue.summary {
            built.push(Arc::new(IssueSummarySink::new(
                target.clone(),
                Arc::clone(&transport),
            )));
        }
        if issue.changelog {
            built.push(Arc::new(ChangelogSink::new(target, Arc::clone(&transport))));
        }
    }

    if let Some(campaign) = &sinks.campaign {
        let settings = CampaignSettings {
            endpoint: campaign.endpoint.clone(),
            api_key: env_value(&campaign.api_key_env),
            list_ids: campaign.list_ids.clone(),
            sender_id: campaign.sender_id,
            suppression_groups: campaign.suppression_groups.clone(),
        };
        built.push(Arc::new(CampaignSink::new(settings, Arc::clone(&transport))));
    }

    if let Some(hook) = &sinks.deploy_hook {
        built.push(Arc::new(DeployHookSink::new(
            env_value(&hook.url_env),
            Arc::clone(&transport),
        )));
    }

    built
}

fn build_pipeline(config: &Config, cli: &Cli) -> anyhow::Result<Pipeline> {
    let transport = build_transport(config, cli.dry)?;
    let sinks = build_sinks(&config.sinks, transport);
    if sinks.is_empty() {
        warn!("No notification sinks configured");
    }

    let dispatcher = match config.dispatch.sink_timeout() {
        Some(timeout) => FanoutDispatcher::with_timeout(timeout),
        None => FanoutDispatcher::new(),
    };

    Ok(Pipeline::new(
        build_collector(config)?,
        build_store(config)?,
        SignificancePolicy::with_capacity_rule(config.significance.capacity_rule()),
        dispatcher,
        sinks,
        cli.options(config),
    ))
}

fn log_failure(error: &PipelineError) {
    match error {
        PipelineError::Notify(dispatch) => {
            for failure in dispatch.failures() {
                error!("Sink '{}' failed: {}", failure.sink_id, failure.error);
            }
            if !dispatch.succeeded().is_empty() {
                info!("Delivered by: {}", dispatch.succeeded().join(", "));
            }
            info!("The new snapshot was persisted despite the failed notifications");
        }
        e if e.is_acquisition_failure() => {
            error!("{}", e);
            info!("Nothing was persisted");
        }
        e => error!("{}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    cli.validate()
        .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config, &cli).context("Failed to initialize pipeline")?;

    info!(
        "Starting run for {:?} with {} sinks",
        config.domain,
        pipeline.sink_count()
    );

    match pipeline.run().await {
        Ok(report) => {
            info!(
                "Run complete: {} changes, {} targets, delivered by {} sinks",
                report.changes.len(),
                report.target_count,
                report.succeeded().len()
            );
            Ok(())
        }
        Err(e) => {
            log_failure(&e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vax_notify::config::{CampaignConfig, DeployHookConfig, IssueConfig};
    use vax_notify::sinks::RecordingTransport;

    fn cli(config: Option<PathBuf>) -> Cli {
        Cli {
            config,
            dry: false,
            notify_no_dates: false,
            verbose: false,
        }
    }

    fn issue_config(summary: bool, changelog: bool) -> IssueConfig {
        IssueConfig {
            api_base: "https://api.github.com".to_string(),
            owner: "sachsen-impft".to_string(),
            repo: "vax-notify".to_string(),
            number: 1,
            token_env: "VAX_NOTIFY_TEST_UNSET_TOKEN".to_string(),
            summary,
            changelog,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(cli(Some(file.path().to_path_buf())).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        // Missing files are handled by load_config
        assert!(cli(Some(PathBuf::from("/nonexistent/config.toml")))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cli(Some(dir.path().to_path_buf())).validate().is_err());
    }

    #[test]
    fn test_cli_validation_no_config() {
        assert!(cli(None).validate().is_ok());
    }

    #[test]
    fn test_cli_parses_flags() {
        let parsed = Cli::try_parse_from([
            "vax-notify",
            "--config",
            "free-dates.toml",
            "--dry",
            "--notify-no-dates",
        ])
        .unwrap();

        assert_eq!(parsed.config, Some(PathBuf::from("free-dates.toml")));
        assert!(parsed.dry);
        assert!(parsed.notify_no_dates);
        assert!(!parsed.verbose);
    }

    #[test]
    fn test_notify_no_dates_selects_every_entry() {
        let config = Config {
            allow_missing_snapshot: true,
            ..Config::default()
        };
        let mut args = cli(None);
        assert_eq!(args.options(&config).mode, SelectionMode::SignificantChanges);

        args.notify_no_dates = true;
        let options = args.options(&config);
        assert_eq!(options.mode, SelectionMode::AllEntries);
        assert!(options.allow_missing_snapshot);
    }

    #[test]
    fn test_load_config_missing_file_falls_back_to_defaults_and_validates() {
        // Defaults have no collector command, so validation rejects them
        let result = load_config(Some(Path::new("/nonexistent/vax-notify.toml")));
        assert!(matches!(result, Err(ConfigError::MissingValue(_))));
    }

    #[test]
    fn test_load_config_invalid_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"domain = \"unknown\"").unwrap();

        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"domain = \"free-dates\"\n[collector]\ncommand = [\"scrape\"]\n")
            .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.domain.value_kind(), vax_notify::ValueKind::Count);
    }

    #[test]
    fn test_build_sinks_from_config() {
        let sinks = SinksConfig {
            issue: Some(issue_config(true, false)),
            campaign: Some(CampaignConfig {
                endpoint: "https://api.sendgrid.com/v3/marketing/singlesends".to_string(),
                api_key_env: "VAX_NOTIFY_TEST_UNSET_KEY".to_string(),
                list_ids: vec!["7".to_string()],
                sender_id: None,
                suppression_groups: Default::default(),
            }),
            deploy_hook: Some(DeployHookConfig::default()),
        };

        let built = build_sinks(&sinks, Arc::new(RecordingTransport::new()));
        let ids: Vec<&str> = built.iter().map(|sink| sink.id()).collect();

        assert_eq!(ids, vec!["issue-summary", "email-campaign", "deploy-hook"]);
    }

    #[test]
    fn test_build_sinks_empty_config() {
        let built = build_sinks(&SinksConfig::default(), Arc::new(LogTransport));
        assert!(built.is_empty());
    }

    #[test]
    fn test_build_pipeline_in_dry_mode() {
        let config = Config::from_toml_str(
            "[collector]\ncommand = [\"scrape\"]\n[sinks.issue]\nowner = \"o\"\nrepo = \"r\"\nnumber = 3\n",
        )
        .unwrap();
        let mut args = cli(None);
        args.dry = true;

        let pipeline = build_pipeline(&config, &args).unwrap();
        assert_eq!(pipeline.sink_count(), 2);
    }
}
