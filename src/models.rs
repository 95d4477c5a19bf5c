//! Core data structures shared by the reconciliation components

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, SyncError};

/// Gmail's inbox label id; removed from every message a filter routes elsewhere
pub const INBOX_LABEL_ID: &str = "INBOX";

/// Labels owned by Gmail itself. They are never listed, created or deleted here.
pub const SYSTEM_LABELS: &[&str] = &[
    "CHAT",
    "SENT",
    "INBOX",
    "IMPORTANT",
    "DRAFT",
    "SPAM",
    "TRASH",
    "STARRED",
    "UNREAD",
    "CATEGORY_FORUMS",
    "CATEGORY_UPDATES",
    "CATEGORY_PERSONAL",
    "CATEGORY_PROMOTIONS",
    "CATEGORY_SOCIAL",
    "CATEGORY_PURCHASES",
    "[Imap]/Drafts",
];

/// Returns true for Gmail system, status and category labels
pub fn is_system_label(name: &str) -> bool {
    SYSTEM_LABELS.contains(&name) || name.starts_with("CATEGORY_")
}

pub type LabelId = String;
pub type FilterId = String;

/// Label as returned by the mailbox service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        is_system_label(&self.name)
    }
}

static SENDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._@+\-]+$").expect("sender pattern is valid"));

/// Normalized sender match key: a domain, a domain fragment or a full address.
///
/// Always lowercase and free of whitespace. Used verbatim as the `from` criterion of
/// filters and in `from:` search queries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SenderDomain(String);

impl SenderDomain {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();

        let invalid = |reason: &str| SyncError::InvalidDomain {
            domain: raw.to_string(),
            reason: reason.to_string(),
        };

        if normalized.is_empty() {
            return Err(invalid("domain is empty"));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        if !SENDER_PATTERN.is_match(&normalized) {
            return Err(invalid("only letters, digits and . @ _ + - are allowed"));
        }
        if normalized.trim_matches(|c| c == '.' || c == '@').is_empty() {
            return Err(invalid("no domain characters"));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Gmail search query matching every message from this sender
    pub fn search_query(&self) -> String {
        format!("from:{}", self.0)
    }

    /// True when a filter's `from` criterion targets exactly this sender
    pub fn matches_criterion(&self, from: &str) -> bool {
        from.trim().eq_ignore_ascii_case(&self.0)
    }
}

impl fmt::Display for SenderDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SenderDomain {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SenderDomain> for String {
    fn from(domain: SenderDomain) -> Self {
        domain.0
    }
}

/// Validated filter creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    from: SenderDomain,
    add_label_id: LabelId,
    remove_label_id: LabelId,
}

impl FilterSpec {
    pub fn new(
        from: SenderDomain,
        add_label_id: impl Into<String>,
        remove_label_id: impl Into<String>,
    ) -> Result<Self> {
        let add_label_id = add_label_id.into().trim().to_string();
        let remove_label_id = remove_label_id.into().trim().to_string();

        if add_label_id.is_empty() {
            return Err(SyncError::InvalidFilterSpec(
                "filter must add a label".to_string(),
            ));
        }
        if remove_label_id.is_empty() {
            return Err(SyncError::InvalidFilterSpec(
                "filter must remove a label".to_string(),
            ));
        }
        if add_label_id == remove_label_id {
            return Err(SyncError::InvalidFilterSpec(format!(
                "label {} cannot be both added and removed",
                add_label_id
            )));
        }

        Ok(Self {
            from,
            add_label_id,
            remove_label_id,
        })
    }

    /// Standard shape: tag mail from `from` with `label_id` and skip the inbox
    pub fn archive_to(from: SenderDomain, label_id: &str) -> Result<Self> {
        Self::new(from, label_id, INBOX_LABEL_ID)
    }

    pub fn from(&self) -> &SenderDomain {
        &self.from
    }

    pub fn add_label_id(&self) -> &str {
        &self.add_label_id
    }

    pub fn remove_label_id(&self) -> &str {
        &self.remove_label_id
    }
}

/// Gmail filter as listed from the service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExistingFilter {
    pub id: FilterId,
    pub from: Option<String>,
    pub query: Option<String>,
    pub add_label_ids: Vec<LabelId>,
    pub remove_label_ids: Vec<LabelId>,
}

impl ExistingFilter {
    /// Identity check: same sender criterion and the label is among the added ones.
    /// Removed labels are not part of the key.
    pub fn is_equivalent(&self, domain: &SenderDomain, label_id: &str) -> bool {
        let from_matches = self
            .from
            .as_deref()
            .is_some_and(|from| domain.matches_criterion(from));

        from_matches && self.add_label_ids.iter().any(|id| id == label_id)
    }
}

/// Search hit; only the id is needed to mutate the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Header metadata fetched to infer sender groupings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageHeaders {
    pub id: String,
    pub from: Option<String>,
    pub label_ids: Vec<LabelId>,
}

/// Label name -> sender domains seen on messages carrying that label.
/// Computed on demand, never persisted.
pub type SenderGroups = BTreeMap<String, BTreeSet<SenderDomain>>;

/// Result of resolving a label name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelResolution {
    pub id: LabelId,
    pub name: String,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Created(FilterId),
    AlreadyExists(FilterId),
}

impl FilterOutcome {
    pub fn filter_id(&self) -> &str {
        match self {
            FilterOutcome::Created(id) | FilterOutcome::AlreadyExists(id) => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, FilterOutcome::Created(_))
    }
}

/// Outcome of retroactively labeling the messages of one sender
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelingReport {
    pub matched: usize,
    pub modified: usize,
    /// (message id, error message) for every mutation that failed
    pub failures: Vec<(String, String)>,
}

impl LabelingReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-domain progress through a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Pending,
    CheckingExisting,
    FilterCreated,
    FilterExists,
    LabelingExistingMessages,
    Done,
    Failed,
    /// Same sender as an earlier entry of the request; nothing was called for it
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOutcome {
    /// Domain as entered, so rejected input is still reported verbatim
    pub input: String,
    pub domain: Option<SenderDomain>,
    pub state: DomainState,
    pub filter: Option<FilterOutcome>,
    pub labeling: Option<LabelingReport>,
    pub error: Option<String>,
    /// Input of the earlier entry this one duplicates
    pub duplicate_of: Option<String>,
}

impl DomainOutcome {
    pub fn pending(input: &str, domain: SenderDomain) -> Self {
        Self {
            input: input.to_string(),
            domain: Some(domain),
            state: DomainState::Pending,
            filter: None,
            labeling: None,
            error: None,
            duplicate_of: None,
        }
    }

    pub fn duplicate(input: &str, domain: SenderDomain, first_input: &str) -> Self {
        Self {
            state: DomainState::Skipped,
            duplicate_of: Some(first_input.to_string()),
            ..Self::pending(input, domain)
        }
    }

    pub fn rejected(input: &str, error: &SyncError) -> Self {
        Self {
            input: input.to_string(),
            domain: None,
            state: DomainState::Failed,
            filter: None,
            labeling: None,
            error: Some(error.to_string()),
            duplicate_of: None,
        }
    }

    pub fn fail(&mut self, error: &SyncError) {
        self.state = DomainState::Failed;
        self.error = Some(error.to_string());
    }

    /// One-line, human readable status used by the CLI
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        match &self.filter {
            Some(FilterOutcome::Created(id)) => parts.push(format!("filter created ({})", id)),
            Some(FilterOutcome::AlreadyExists(id)) => {
                parts.push(format!("filter already exists ({})", id))
            }
            None => {}
        }

        if let Some(labeling) = &self.labeling {
            let mut text = format!(
                "labeled {}/{} existing messages",
                labeling.modified, labeling.matched
            );
            if !labeling.failures.is_empty() {
                text.push_str(&format!(", {} failed", labeling.failures.len()));
            }
            parts.push(text);
        }

        if let Some(error) = &self.error {
            parts.push(format!("failed: {}", error));
        }

        if let Some(first) = &self.duplicate_of {
            parts.push(format!("skipped, same sender as '{}'", first));
        }

        format!("{}: {}", self.input, parts.join("; "))
    }
}

/// Outcome of one attach/create workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub label: LabelResolution,
    pub domains: Vec<DomainOutcome>,
}

impl ReconciliationReport {
    pub fn filters_created(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| d.filter.as_ref().is_some_and(FilterOutcome::was_created))
            .count()
    }

    pub fn filters_existing(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| matches!(d.filter, Some(FilterOutcome::AlreadyExists(_))))
            .count()
    }

    pub fn messages_modified(&self) -> usize {
        self.domains
            .iter()
            .filter_map(|d| d.labeling.as_ref())
            .map(|l| l.modified)
            .sum()
    }

    pub fn failed_domains(&self) -> Vec<&DomainOutcome> {
        self.domains
            .iter()
            .filter(|d| d.state == DomainState::Failed)
            .collect()
    }

    pub fn skipped_domains(&self) -> Vec<&DomainOutcome> {
        self.domains
            .iter()
            .filter(|d| d.state == DomainState::Skipped)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(raw: &str) -> SenderDomain {
        SenderDomain::parse(raw).unwrap()
    }

    #[test]
    fn test_sender_domain_normalizes() {
        assert_eq!(domain("  Example.COM ").as_str(), "example.com");
        assert_eq!(domain("News@Shop.com").as_str(), "news@shop.com");
        assert_eq!(domain("example.com").search_query(), "from:example.com");
    }

    #[test]
    fn test_sender_domain_rejects_bad_input() {
        for raw in ["", "   ", "exa mple.com", "shop.com;rm", "from:(x)", "..", "@"] {
            assert!(SenderDomain::parse(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_sender_domain_serde_validates() {
        let parsed: SenderDomain = serde_json::from_str("\"A.com\"").unwrap();
        assert_eq!(parsed.as_str(), "a.com");
        assert!(serde_json::from_str::<SenderDomain>("\"a b\"").is_err());
    }

    #[test]
    fn test_filter_spec_archive_shape() {
        let spec = FilterSpec::archive_to(domain("a.com"), "Label_1").unwrap();
        assert_eq!(spec.from().as_str(), "a.com");
        assert_eq!(spec.add_label_id(), "Label_1");
        assert_eq!(spec.remove_label_id(), INBOX_LABEL_ID);
    }

    #[test]
    fn test_filter_spec_rejects_malformed_actions() {
        assert!(FilterSpec::archive_to(domain("a.com"), "").is_err());
        assert!(FilterSpec::archive_to(domain("a.com"), "  ").is_err());
        assert!(FilterSpec::archive_to(domain("a.com"), INBOX_LABEL_ID).is_err());
        assert!(FilterSpec::new(domain("a.com"), "Label_1", "").is_err());
    }

    #[test]
    fn test_existing_filter_equivalence_ignores_remove_labels() {
        let filter = ExistingFilter {
            id: "f1".to_string(),
            from: Some("A.com".to_string()),
            add_label_ids: vec!["Label_1".to_string(), "Label_2".to_string()],
            remove_label_ids: vec![],
            ..Default::default()
        };

        assert!(filter.is_equivalent(&domain("a.com"), "Label_1"));
        assert!(filter.is_equivalent(&domain("a.com"), "Label_2"));
        assert!(!filter.is_equivalent(&domain("a.com"), "Label_3"));
        assert!(!filter.is_equivalent(&domain("b.com"), "Label_1"));
        // Substring of the criterion is a different filter
        assert!(!filter.is_equivalent(&domain("news.a.com"), "Label_1"));
    }

    #[test]
    fn test_existing_filter_without_from_never_matches() {
        let filter = ExistingFilter {
            id: "f1".to_string(),
            query: Some("from:a.com".to_string()),
            add_label_ids: vec!["Label_1".to_string()],
            ..Default::default()
        };
        assert!(!filter.is_equivalent(&domain("a.com"), "Label_1"));
    }

    #[test]
    fn test_system_labels() {
        assert!(is_system_label("INBOX"));
        assert!(is_system_label("CATEGORY_PROMOTIONS"));
        assert!(is_system_label("CATEGORY_SOMETHING_NEW"));
        assert!(is_system_label("[Imap]/Drafts"));
        assert!(!is_system_label("Inbox Zero"));
        assert!(!is_system_label("Shopping"));
    }

    #[test]
    fn test_domain_outcome_summary() {
        let mut outcome = DomainOutcome::pending("A.com", domain("a.com"));
        outcome.filter = Some(FilterOutcome::Created("f1".to_string()));
        outcome.labeling = Some(LabelingReport {
            matched: 3,
            modified: 2,
            failures: vec![("m2".to_string(), "boom".to_string())],
        });
        outcome.state = DomainState::Done;

        let summary = outcome.summary();
        assert!(summary.starts_with("A.com: filter created (f1)"));
        assert!(summary.contains("labeled 2/3 existing messages, 1 failed"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parsed_domains_are_lowercase_and_trimmed(raw in "[ ]{0,3}[A-Za-z0-9][A-Za-z0-9.@_+-]{0,30}[ ]{0,3}") {
                let parsed = SenderDomain::parse(&raw).unwrap();
                prop_assert_eq!(parsed.as_str(), raw.trim().to_lowercase());
                prop_assert!(!parsed.as_str().chars().any(|c| c.is_uppercase() || c.is_whitespace()));
            }

            #[test]
            fn parsing_is_idempotent(raw in "[A-Za-z0-9][A-Za-z0-9.@_+-]{0,30}") {
                let once = SenderDomain::parse(&raw).unwrap();
                let twice = SenderDomain::parse(once.as_str()).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}
