use crate::error::{ConfigError, SinkError};
use crate::sinks::{NotificationEvent, NotifyFuture, OutboundRequest, Sink, Transport};
use log::{debug, info};
use std::sync::Arc;

/// Triggers a redeploy of the published site after a meaningful change
pub struct DeployHookSink {
    url: Option<String>,
    transport: Arc<dyn Transport>,
}

impl DeployHookSink {
    pub fn new(url: Option<String>, transport: Arc<dyn Transport>) -> Self {
        Self { url, transport }
    }

    fn missing_url() -> ConfigError {
        ConfigError::MissingValue(
            "deploy hook URL; either run with --dry or configure sinks.deploy_hook".to_string(),
        )
    }
}

impl Sink for DeployHookSink {
    fn id(&self) -> &str {
        "deploy-hook"
    }

    fn validate(&self, event: &NotificationEvent) -> Result<(), ConfigError> {
        if event.has_targets() && self.url.is_none() && self.transport.is_live() {
            return Err(Self::missing_url());
        }
        Ok(())
    }

    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move {
            if !event.has_targets() {
                debug!("Nothing changed, deploy hook not triggered");
                return Ok(());
            }

            let Some(url) = &self.url else {
                if self.transport.is_live() {
                    return Err(SinkError::Configuration(Self::missing_url()));
                }
                info!("[dry] would trigger deploy hook (no URL configured)");
                return Ok(());
            };

            let response = self.transport.send(&OutboundRequest::get(url.clone())).await?;
            match response {
                Some(body) => info!("Deploy hook triggered: {}", body),
                None => info!("Deploy hook triggered"),
            }
            Ok(())
        })
    }
}
