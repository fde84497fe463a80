use crate::error::{ConfigError, SinkError};
use crate::significance::{NotificationTarget, TargetReason};
use crate::sinks::{NotificationEvent, NotifyFuture, OutboundRequest, Sink, Transport};
use crate::state::EntityId;
use log::{debug, info, warn};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Addressing of outbound email campaigns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignSettings {
    /// Endpoint campaigns are created at
    pub endpoint: String,
    /// Opaque API key, sent as bearer token
    pub api_key: Option<String>,
    /// Recipient lists every campaign is sent to
    pub list_ids: Vec<String>,
    /// Sender identity configured at the campaign provider
    pub sender_id: Option<u64>,
    /// Unsubscribe group per entity, so recipients can opt out per centre
    pub suppression_groups: BTreeMap<EntityId, u64>,
}

/// Sends one email campaign per notification target
///
/// Removed entities are not announced. Targets without a suppression group
/// are skipped, since recipients could not unsubscribe from them.
pub struct CampaignSink {
    settings: CampaignSettings,
    transport: Arc<dyn Transport>,
}

impl CampaignSink {
    pub fn new(settings: CampaignSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    fn announced<'a>(event: &'a NotificationEvent) -> impl Iterator<Item = &'a NotificationTarget> {
        event
            .targets
            .iter()
            .filter(|target| target.reason != TargetReason::Removed)
    }

    fn campaign_request(&self, target: &NotificationTarget, group: u64) -> OutboundRequest {
        let current = target
            .new
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_default();

        OutboundRequest::post(
            self.settings.endpoint.clone(),
            json!({
                "name": format!("{} ({})", target.entity_id, current),
                "send_to": { "list_ids": self.settings.list_ids },
                "email_config": {
                    "subject": format!("{}: {}", target.entity_id, current),
                    "plain_content": format!("{}\n\n{}", target.entity_id, current),
                    "suppression_group_id": group,
                    "sender_id": self.settings.sender_id,
                },
            }),
        )
        .bearer(self.settings.api_key.as_deref())
    }
}

impl Sink for CampaignSink {
    fn id(&self) -> &str {
        "email-campaign"
    }

    fn validate(&self, event: &NotificationEvent) -> Result<(), ConfigError> {
        if self.transport.is_live() && Self::announced(event).next().is_some() {
            if self.settings.endpoint.is_empty() {
                return Err(ConfigError::MissingValue("campaign endpoint".to_string()));
            }
            if self.settings.list_ids.is_empty() {
                return Err(ConfigError::MissingValue("campaign list ids".to_string()));
            }
        }
        Ok(())
    }

    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move {
            let mut failures = Vec::new();
            let mut sent = 0;

            for target in Self::announced(event) {
                let Some(group) = self.settings.suppression_groups.get(&target.entity_id) else {
                    warn!(
                        "No suppression group configured for '{}', skipping campaign",
                        target.entity_id
                    );
                    continue;
                };

                let request = self.campaign_request(target, *group);
                match self.transport.send(&request).await {
                    Ok(_) => sent += 1,
                    Err(e) => failures.push(format!("{} ({})", target.entity_id, e)),
                }
            }

            if sent == 0 && failures.is_empty() {
                debug!("No campaign-worthy targets");
            } else {
                info!("Sent {} campaigns", sent);
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(SinkError::NotificationFailed(format!(
                    "campaigns failed for {}",
                    failures.join(", ")
                )))
            }
        })
    }
}
