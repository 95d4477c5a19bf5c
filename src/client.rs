//! Mailbox service abstraction and the Gmail API implementation behind it

use async_trait::async_trait;
use google_gmail1::{
    api::{Filter, FilterAction, FilterCriteria, Label as GmailLabel, Message, ModifyMessageRequest},
    hyper_rustls, hyper_util, Gmail,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Result, SyncError};
use crate::models::{ExistingFilter, FilterId, FilterSpec, Label, MessageHeaders, MessageRef};

const SCOPE_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
const SCOPE_LABELS: &str = "https://www.googleapis.com/auth/gmail.labels";
const SCOPE_SETTINGS: &str = "https://www.googleapis.com/auth/gmail.settings.basic";

/// Page size used when walking message listings
const PAGE_SIZE: u32 = 100;

/// Longest pause between retries, server `Retry-After` hints included
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Operations the reconciliation core needs from a hosted mailbox
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailboxService: Send + Sync {
    /// List every label in the account, system labels included
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a visible label and return it with its assigned id
    async fn create_label(&self, name: &str) -> Result<Label>;

    async fn delete_label(&self, label_id: &str) -> Result<()>;

    async fn list_filters(&self) -> Result<Vec<ExistingFilter>>;

    /// Create a filter and return its id
    async fn create_filter(&self, spec: &FilterSpec) -> Result<FilterId>;

    async fn delete_filter(&self, filter_id: &str) -> Result<()>;

    /// All messages matching a Gmail search query, across every result page
    async fn search_messages(&self, query: &str) -> Result<Vec<MessageRef>>;

    /// Up to `max` messages carrying the given label
    async fn list_messages_with_label(&self, label_id: &str, max: u32) -> Result<Vec<MessageRef>>;

    /// Header metadata (From, label ids) of one message
    async fn get_message_headers(&self, message_id: &str) -> Result<MessageHeaders>;

    /// Add and remove labels on a single message
    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Gmail hub built on the rustls HTTPS connector
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Gmail API client with per-call timeout and retry on transient failures
pub struct ProductionGmailClient {
    hub: GmailHub,
    max_retries: u32,
    request_timeout: Duration,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub, config: &ClientConfig) -> Self {
        Self {
            hub,
            max_retries: config.max_retries,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Check if an error is retryable
    fn should_retry(error: &SyncError) -> bool {
        error.is_transient()
    }

    /// Run `operation` with a timeout, retrying transient failures with
    /// exponential backoff (1s doubling, capped at 30s)
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        timeout: Duration,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::NetworkError(format!(
                    "{} timed out after {:?}",
                    operation_name, timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    let wait = match &e {
                        SyncError::RateLimitExceeded { retry_after } => {
                            delay.max(Duration::from_secs(*retry_after)).min(MAX_BACKOFF)
                        }
                        _ => delay,
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = std::cmp::min(delay * 2, MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn retry<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        Self::with_retry(
            operation_name,
            self.max_retries,
            self.request_timeout,
            operation,
        )
        .await
    }
}

/// Convert an API filter into our listing shape; filters without an id are skipped
fn to_existing_filter(filter: Filter) -> Option<ExistingFilter> {
    let id = filter.id?;
    let criteria = filter.criteria.unwrap_or_default();
    let action = filter.action.unwrap_or_default();

    Some(ExistingFilter {
        id,
        from: criteria.from,
        query: criteria.query,
        add_label_ids: action.add_label_ids.unwrap_or_default(),
        remove_label_ids: action.remove_label_ids.unwrap_or_default(),
    })
}

fn to_gmail_filter(spec: &FilterSpec) -> Filter {
    Filter {
        criteria: Some(FilterCriteria {
            from: Some(spec.from().to_string()),
            ..Default::default()
        }),
        action: Some(FilterAction {
            add_label_ids: Some(vec![spec.add_label_id().to_string()]),
            remove_label_ids: Some(vec![spec.remove_label_id().to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn to_message_headers(msg: Message) -> Result<MessageHeaders> {
    let id = msg
        .id
        .ok_or_else(|| SyncError::InvalidResponse("message without id".to_string()))?;

    let from = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .find(|h| {
            h.name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case("from"))
        })
        .and_then(|h| h.value);

    Ok(MessageHeaders {
        id,
        from,
        label_ids: msg.label_ids.unwrap_or_default(),
    })
}

fn non_empty(ids: &[String]) -> Option<Vec<String>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.to_vec())
    }
}

#[async_trait]
impl MailboxService for ProductionGmailClient {
    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.retry("list_labels", || async move {
            debug!("Calling Gmail API to list labels...");
            let (_, response) = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(SCOPE_LABELS)
                .doit()
                .await?;

            let labels: Vec<Label> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(Label { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Listed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        // Not retried: a timed-out create may still have succeeded remotely
        let label = GmailLabel {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(SCOPE_LABELS)
            .doit()
            .await?;

        let id = created
            .id
            .ok_or_else(|| SyncError::InvalidResponse("created label has no id".to_string()))?;

        Ok(Label {
            id,
            name: created.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        self.hub
            .users()
            .labels_delete("me", label_id)
            .add_scope(SCOPE_LABELS)
            .doit()
            .await?;

        Ok(())
    }

    async fn list_filters(&self) -> Result<Vec<ExistingFilter>> {
        self.retry("list_filters", || async move {
            debug!("Calling Gmail API to list filters...");
            let (_, response) = self
                .hub
                .users()
                .settings_filters_list("me")
                .add_scope(SCOPE_SETTINGS)
                .doit()
                .await?;

            let filters: Vec<ExistingFilter> = response
                .filter
                .unwrap_or_default()
                .into_iter()
                .filter_map(to_existing_filter)
                .collect();

            debug!("Listed {} filters", filters.len());
            Ok(filters)
        })
        .await
    }

    async fn create_filter(&self, spec: &FilterSpec) -> Result<FilterId> {
        // Not retried for the same reason as create_label
        let (_, created) = self
            .hub
            .users()
            .settings_filters_create(to_gmail_filter(spec), "me")
            .add_scope(SCOPE_SETTINGS)
            .doit()
            .await?;

        created
            .id
            .ok_or_else(|| SyncError::InvalidResponse("created filter has no id".to_string()))
    }

    async fn delete_filter(&self, filter_id: &str) -> Result<()> {
        self.hub
            .users()
            .settings_filters_delete("me", filter_id)
            .add_scope(SCOPE_SETTINGS)
            .doit()
            .await?;

        Ok(())
    }

    async fn search_messages(&self, query: &str) -> Result<Vec<MessageRef>> {
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = self
                .retry("search_messages", || {
                    let token = token.clone();
                    async move {
                        let mut call = self
                            .hub
                            .users()
                            .messages_list("me")
                            .q(query)
                            .max_results(PAGE_SIZE);
                        if let Some(token) = token.as_deref() {
                            call = call.page_token(token);
                        }
                        let (_, response) = call.add_scope(SCOPE_MODIFY).doit().await?;
                        Ok(response)
                    }
                })
                .await?;

            refs.extend(
                response
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id.map(MessageRef::new)),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Query '{}' matched {} messages", query, refs.len());
        Ok(refs)
    }

    async fn list_messages_with_label(&self, label_id: &str, max: u32) -> Result<Vec<MessageRef>> {
        self.retry("list_messages_with_label", || async move {
            let (_, response) = self
                .hub
                .users()
                .messages_list("me")
                .add_label_ids(label_id)
                .max_results(max)
                .add_scope(SCOPE_MODIFY)
                .doit()
                .await?;

            Ok(response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id.map(MessageRef::new))
                .collect())
        })
        .await
    }

    async fn get_message_headers(&self, message_id: &str) -> Result<MessageHeaders> {
        self.retry("get_message_headers", || async move {
            let (_, msg) = self
                .hub
                .users()
                .messages_get("me", message_id)
                .format("metadata")
                .add_metadata_headers("From")
                .add_scope(SCOPE_MODIFY)
                .doit()
                .await?;

            to_message_headers(msg)
        })
        .await
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        // Label add/remove is idempotent remotely, so retrying is safe
        self.retry("modify_message", || async move {
            let request = ModifyMessageRequest {
                add_label_ids: non_empty(add_label_ids),
                remove_label_ids: non_empty(remove_label_ids),
            };

            self.hub
                .users()
                .messages_modify(request, "me", message_id)
                .add_scope(SCOPE_MODIFY)
                .doit()
                .await?;

            Ok(())
        })
        .await
    }
}
