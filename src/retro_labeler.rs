//! Retroactive labeling of messages already in the mailbox
use crate::client::MailboxService;
use crate::error::Result;
use crate::models::{LabelingReport, SenderDomain, INBOX_LABEL_ID};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies a label to existing mail from a sender and moves it out of the inbox
pub struct RetroactiveLabeler {
    client: Arc<dyn MailboxService>,
}

impl RetroactiveLabeler {
    pub fn new(client: Arc<dyn MailboxService>) -> Self {
        Self { client }
    }

    /// Labels every message matching `from:<sender>` with `label_id` and removes INBOX.
    ///
    /// Messages are modified one at a time in search order. A failed modification is
    /// recorded in the report and the rest are still processed; only a failed search
    /// is returned as an error. Re-running is harmless since the mutation is
    /// idempotent.
    pub async fn apply(&self, label_id: &str, sender: &SenderDomain) -> Result<LabelingReport> {
        let query = sender.search_query();
        let messages = self.client.search_messages(&query).await?;
        debug!("{} messages match '{}'", messages.len(), query);

        let add = vec![label_id.to_string()];
        let remove = vec![INBOX_LABEL_ID.to_string()];

        let mut report = LabelingReport {
            matched: messages.len(),
            ..Default::default()
        };

        for message in messages {
            match self.client.modify_message(&message.id, &add, &remove).await {
                Ok(()) => report.modified += 1,
                Err(e) => {
                    warn!("Failed to label message {}: {}", message.id, e);
                    report.failures.push((message.id, e.to_string()));
                }
            }
        }

        info!(
            "Applied label {} to {}/{} existing messages from {}",
            label_id, report.modified, report.matched, sender
        );
        Ok(report)
    }
}
