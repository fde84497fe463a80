use crate::sinks::{NotificationEvent, NotifyFuture, OutboundRequest, Sink, Transport};
use crate::state::{EntityId, Value};
use log::{debug, info};
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;

/// Issue an issue-tracker sink writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTarget {
    /// API base URL, e.g. `https://api.github.com`
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    /// Opaque API token, sent as bearer token when present
    pub token: Option<String>,
}

impl IssueTarget {
    fn issue_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.number
        )
    }

    fn comments_url(&self) -> String {
        format!("{}/comments", self.issue_url())
    }

    fn request(&self, request: OutboundRequest) -> OutboundRequest {
        request
            .header("Accept", "application/vnd.github+json")
            .bearer(self.token.as_deref())
    }
}

/// Bullet line for one entry
///
/// Labels stand for themselves; counts need the entity id for context.
fn entry_line(id: &EntityId, value: &Value) -> String {
    match value {
        Value::Label { label } => format!("* {}", label),
        Value::Count(count) => format!("* {}: {}", id, count),
    }
}

/// Keeps the issue body in sync with the full current state
///
/// Runs on every invocation, so the body always shows when the state was
/// last observed.
pub struct IssueSummarySink {
    target: IssueTarget,
    transport: Arc<dyn Transport>,
}

impl IssueSummarySink {
    pub fn new(target: IssueTarget, transport: Arc<dyn Transport>) -> Self {
        Self { target, transport }
    }

    pub(crate) fn render(event: &NotificationEvent) -> String {
        let lines = event
            .current
            .entries()
            .iter()
            .map(|(id, value)| entry_line(id, value))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "\nlast update: {}\n\n{}\n",
            event.observed_at().to_rfc3339(),
            lines
        )
    }
}

impl Sink for IssueSummarySink {
    fn id(&self) -> &str {
        "issue-summary"
    }

    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move {
            let request = self.target.request(OutboundRequest::patch(
                self.target.issue_url(),
                json!({ "body": Self::render(event) }),
            ));
            self.transport.send(&request).await?;
            info!("Updated summary of issue #{}", self.target.number);
            Ok(())
        })
    }
}

/// Posts a changelog comment whenever the state changed significantly
///
/// The comment lists the full change set, including changes the
/// significance policy suppressed. Runs where every change was suppressed
/// (count noise such as 0 -> 1 -> 0) post nothing.
pub struct ChangelogSink {
    target: IssueTarget,
    transport: Arc<dyn Transport>,
}

impl ChangelogSink {
    pub fn new(target: IssueTarget, transport: Arc<dyn Transport>) -> Self {
        Self { target, transport }
    }

    pub(crate) fn render(event: &NotificationEvent) -> String {
        let changes = &event.changes;
        let mut markdown = format!("\n### Changes at {}\n", event.observed_at().to_rfc3339());

        if !changes.added.is_empty() {
            markdown.push_str("\n#### Added\n");
            for id in &changes.added {
                if let Some(value) = event.current.get(id.as_str()) {
                    let _ = writeln!(markdown, "{}", entry_line(id, value));
                }
            }
        }

        if !changes.removed.is_empty() {
            markdown.push_str("\n#### Removed\n");
            for id in &changes.removed {
                if let Some(value) = event.previous.get(id.as_str()) {
                    let _ = writeln!(markdown, "{}", entry_line(id, value));
                }
            }
        }

        if !changes.changed.is_empty() {
            markdown.push_str("\n#### Changed\n");
            for (id, change) in &changes.changed {
                let _ = writeln!(
                    markdown,
                    "* {}\n  ```diff\n  - {}\n  + {}\n  ```",
                    id, change.old, change.new
                );
            }
        }

        markdown
    }
}

impl Sink for ChangelogSink {
    fn id(&self) -> &str {
        "issue-changelog"
    }

    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move {
            if event.changes.is_empty() {
                debug!("No changes, skipping changelog comment");
                return Ok(());
            }
            if !event.has_targets() {
                debug!(
                    "{} insignificant changes, skipping changelog comment",
                    event.changes.len()
                );
                return Ok(());
            }

            let request = self.target.request(OutboundRequest::post(
                self.target.comments_url(),
                json!({ "body": Self::render(event) }),
            ));
            self.transport.send(&request).await?;
            info!(
                "Posted changelog with {} changes to issue #{}",
                event.changes.len(),
                self.target.number
            );
            Ok(())
        })
    }
}
