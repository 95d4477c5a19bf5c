//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gmail_label_sync::client::MailboxService;
use gmail_label_sync::error::{Result, SyncError};
use gmail_label_sync::models::{
    ExistingFilter, FilterId, FilterSpec, Label, MessageHeaders, MessageRef, INBOX_LABEL_ID,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub id: String,
    pub from: String,
    pub label_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    labels: Vec<Label>,
    filters: Vec<ExistingFilter>,
    messages: Vec<FakeMessage>,
    next_id: usize,

    fail_list_labels: bool,
    fail_search: bool,
    fail_modify_ids: HashSet<String>,
    fail_filter_senders: HashSet<String>,

    create_label_calls: usize,
    create_filter_calls: usize,
    modify_calls: usize,
}

/// In-memory mailbox that behaves like Gmail for labels, filters and messages
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<Mutex<State>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            for system in ["INBOX", "SENT", "TRASH", "SPAM", "CATEGORY_PROMOTIONS", "UNREAD"] {
                state.labels.push(Label::new(system, system));
            }
        }
        fake
    }

    pub fn service(&self) -> Arc<dyn MailboxService> {
        Arc::new(self.clone())
    }

    pub fn with_label(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().labels.push(Label::new(id, name));
        self
    }

    pub fn with_filter(self, id: &str, from: &str, label_id: &str) -> Self {
        self.state.lock().unwrap().filters.push(ExistingFilter {
            id: id.to_string(),
            from: Some(from.to_string()),
            query: None,
            add_label_ids: vec![label_id.to_string()],
            remove_label_ids: vec![INBOX_LABEL_ID.to_string()],
        });
        self
    }

    pub fn with_inbox_message(self, id: &str, from: &str) -> Self {
        self.state.lock().unwrap().messages.push(FakeMessage {
            id: id.to_string(),
            from: from.to_string(),
            label_ids: vec![INBOX_LABEL_ID.to_string()],
        });
        self
    }

    pub fn with_labeled_message(self, id: &str, from: &str, label_id: &str) -> Self {
        self.state.lock().unwrap().messages.push(FakeMessage {
            id: id.to_string(),
            from: from.to_string(),
            label_ids: vec![label_id.to_string()],
        });
        self
    }

    pub fn fail_list_labels(&self) {
        self.state.lock().unwrap().fail_list_labels = true;
    }

    pub fn fail_search(&self) {
        self.state.lock().unwrap().fail_search = true;
    }

    pub fn fail_modify(&self, message_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_modify_ids
            .insert(message_id.to_string());
    }

    pub fn fail_filter_for(&self, sender: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_filter_senders
            .insert(sender.to_string());
    }

    pub fn labels(&self) -> Vec<Label> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn filters(&self) -> Vec<ExistingFilter> {
        self.state.lock().unwrap().filters.clone()
    }

    pub fn message(&self, id: &str) -> Option<FakeMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn create_label_calls(&self) -> usize {
        self.state.lock().unwrap().create_label_calls
    }

    pub fn create_filter_calls(&self) -> usize {
        self.state.lock().unwrap().create_filter_calls
    }

    pub fn modify_calls(&self) -> usize {
        self.state.lock().unwrap().modify_calls
    }
}

/// `from:` matches when the term appears anywhere in the From header
fn matches_query(query: &str, from: &str) -> bool {
    query
        .strip_prefix("from:")
        .is_some_and(|term| from.to_lowercase().contains(&term.to_lowercase()))
}

#[async_trait]
impl MailboxService for FakeMailbox {
    async fn list_labels(&self) -> Result<Vec<Label>> {
        let state = self.state.lock().unwrap();
        if state.fail_list_labels {
            return Err(SyncError::ServerError {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        Ok(state.labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let mut state = self.state.lock().unwrap();
        state.create_label_calls += 1;

        // Gmail rejects names that collide case-insensitively
        if state
            .labels
            .iter()
            .any(|l| l.name.to_lowercase() == name.to_lowercase())
        {
            return Err(SyncError::BadRequest(format!(
                "Label name exists or conflicts: {}",
                name
            )));
        }

        state.next_id += 1;
        let label = Label::new(format!("Label_{}", state.next_id), name);
        state.labels.push(label.clone());
        Ok(label)
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.labels.len();
        state.labels.retain(|l| l.id != label_id);
        if state.labels.len() == before {
            return Err(SyncError::NotFound(label_id.to_string()));
        }
        for message in &mut state.messages {
            message.label_ids.retain(|id| id != label_id);
        }
        Ok(())
    }

    async fn list_filters(&self) -> Result<Vec<ExistingFilter>> {
        Ok(self.state.lock().unwrap().filters.clone())
    }

    async fn create_filter(&self, spec: &FilterSpec) -> Result<FilterId> {
        let mut state = self.state.lock().unwrap();
        state.create_filter_calls += 1;

        if state.fail_filter_senders.contains(spec.from().as_str()) {
            return Err(SyncError::BadRequest("Too many filters".to_string()));
        }

        state.next_id += 1;
        let id = format!("filter_{}", state.next_id);
        state.filters.push(ExistingFilter {
            id: id.clone(),
            from: Some(spec.from().to_string()),
            query: None,
            add_label_ids: vec![spec.add_label_id().to_string()],
            remove_label_ids: vec![spec.remove_label_id().to_string()],
        });
        Ok(id)
    }

    async fn delete_filter(&self, filter_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.filters.len();
        state.filters.retain(|f| f.id != filter_id);
        if state.filters.len() == before {
            return Err(SyncError::NotFound(filter_id.to_string()));
        }
        Ok(())
    }

    async fn search_messages(&self, query: &str) -> Result<Vec<MessageRef>> {
        let state = self.state.lock().unwrap();
        if state.fail_search {
            return Err(SyncError::NetworkError("connection reset".to_string()));
        }
        Ok(state
            .messages
            .iter()
            .filter(|m| matches_query(query, &m.from))
            .map(|m| MessageRef::new(m.id.clone()))
            .collect())
    }

    async fn list_messages_with_label(&self, label_id: &str, max: u32) -> Result<Vec<MessageRef>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.label_ids.iter().any(|id| id == label_id))
            .take(max as usize)
            .map(|m| MessageRef::new(m.id.clone()))
            .collect())
    }

    async fn get_message_headers(&self, message_id: &str) -> Result<MessageHeaders> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| MessageHeaders {
                id: m.id.clone(),
                from: Some(m.from.clone()),
                label_ids: m.label_ids.clone(),
            })
            .ok_or_else(|| SyncError::NotFound(message_id.to_string()))
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.modify_calls += 1;

        if state.fail_modify_ids.contains(message_id) {
            return Err(SyncError::ServerError {
                status: 503,
                message: "try again later".to_string(),
            });
        }

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| SyncError::NotFound(message_id.to_string()))?;

        for id in add_label_ids {
            if !message.label_ids.contains(id) {
                message.label_ids.push(id.clone());
            }
        }
        message.label_ids.retain(|id| !remove_label_ids.contains(id));
        Ok(())
    }
}

pub fn domains(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}
