//! Label/filter workflows composed from the catalog, reconciler and labeler
use crate::client::MailboxService;
use crate::error::{Result, SyncError};
use crate::filter_reconciler::FilterReconciler;
use crate::label_catalog::LabelCatalog;
use crate::models::{
    DomainOutcome, DomainState, ExistingFilter, FilterOutcome, LabelResolution,
    ReconciliationReport, SenderDomain, SenderGroups,
};
use crate::retro_labeler::RetroactiveLabeler;
use crate::sender_domain::SenderDomainExtractor;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for every workflow exposed by the CLI and the menu
pub struct ReconciliationOrchestrator {
    client: Arc<dyn MailboxService>,
    labels: LabelCatalog,
    filters: FilterReconciler,
    labeler: RetroactiveLabeler,
    extractor: SenderDomainExtractor,
}

impl ReconciliationOrchestrator {
    pub fn new(client: Arc<dyn MailboxService>) -> Self {
        Self {
            labels: LabelCatalog::new(Arc::clone(&client)),
            filters: FilterReconciler::new(Arc::clone(&client)),
            labeler: RetroactiveLabeler::new(Arc::clone(&client)),
            extractor: SenderDomainExtractor::new(),
            client,
        }
    }

    pub fn labels(&self) -> &LabelCatalog {
        &self.labels
    }

    pub fn filters(&self) -> &FilterReconciler {
        &self.filters
    }

    /// Reconciles `domains` against an existing label given by name or id.
    ///
    /// Fails with `LabelNotFound` without touching filters or messages when the
    /// label does not exist.
    pub async fn attach_domains_to_label(
        &self,
        label: &str,
        domains: &[String],
    ) -> Result<ReconciliationReport> {
        let found = self
            .labels
            .find(label)
            .await?
            .ok_or_else(|| SyncError::LabelNotFound(label.trim().to_string()))?;

        info!(
            "Selected label: {} ({}), {} domain(s)",
            found.name,
            found.id,
            domains.len()
        );

        let resolution = LabelResolution {
            id: found.id,
            name: found.name,
            created: false,
        };
        Ok(self.reconcile(resolution, domains).await)
    }

    /// Resolves or creates `label_name`, then reconciles `domains` against it
    pub async fn create_label_with_domains(
        &self,
        label_name: &str,
        domains: &[String],
    ) -> Result<ReconciliationReport> {
        let resolution = self.labels.resolve_or_create(label_name).await?;
        Ok(self.reconcile(resolution, domains).await)
    }

    pub async fn delete_label(&self, label_id: &str) -> Result<()> {
        self.labels.delete(label_id).await
    }

    pub async fn delete_filter(&self, filter_id: &str) -> Result<()> {
        self.filters.delete(filter_id).await
    }

    /// Sender domains seen on up to `max_per_label` messages of each user label.
    ///
    /// Failures on a single label or message are logged and skipped.
    pub async fn sender_groups(&self, max_per_label: u32) -> SenderGroups {
        let mut groups = SenderGroups::new();

        for (name, id) in self.labels.list_user_labels().await {
            let messages = match self.client.list_messages_with_label(&id, max_per_label).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Failed to list messages for label '{}': {}", name, e);
                    groups.insert(name, BTreeSet::new());
                    continue;
                }
            };

            let mut domains = BTreeSet::new();
            for message in messages {
                match self.client.get_message_headers(&message.id).await {
                    Ok(headers) => domains.extend(self.extractor.extract_from(&headers)),
                    Err(e) => warn!("Failed to fetch headers of message {}: {}", message.id, e),
                }
            }

            debug!("Label '{}': {} sender domain(s)", name, domains.len());
            groups.insert(name, domains);
        }

        groups
    }

    /// Every filter with its added label ids resolved to names where possible
    pub async fn filters_overview(&self) -> Result<Vec<(ExistingFilter, Vec<String>)>> {
        let filters = self.filters.list().await?;
        let names: HashMap<String, String> = match self.client.list_labels().await {
            Ok(labels) => labels.into_iter().map(|l| (l.id, l.name)).collect(),
            Err(e) => {
                warn!("Showing raw label ids, labels unavailable: {}", e);
                HashMap::new()
            }
        };

        Ok(filters
            .into_iter()
            .map(|filter| {
                let labels = filter
                    .add_label_ids
                    .iter()
                    .map(|id| names.get(id).cloned().unwrap_or_else(|| id.clone()))
                    .collect();
                (filter, labels)
            })
            .collect())
    }

    async fn reconcile(
        &self,
        label: LabelResolution,
        domains: &[String],
    ) -> ReconciliationReport {
        let mut seen: HashMap<SenderDomain, String> = HashMap::new();
        let mut outcomes = Vec::with_capacity(domains.len());

        for raw in domains {
            let domain = match SenderDomain::parse(raw) {
                Ok(domain) => domain,
                Err(e) => {
                    warn!("Skipping '{}': {}", raw, e);
                    outcomes.push(DomainOutcome::rejected(raw, &e));
                    continue;
                }
            };

            if let Some(first) = seen.get(&domain) {
                info!("Skipping '{}', same sender as '{}'", raw, first);
                outcomes.push(DomainOutcome::duplicate(raw, domain, first));
                continue;
            }
            seen.insert(domain.clone(), raw.clone());

            outcomes.push(self.reconcile_domain(&label.id, raw, domain).await);
        }

        let report = ReconciliationReport {
            label,
            domains: outcomes,
        };
        info!(
            "Label '{}': {} filter(s) created, {} already present, {} message(s) labeled, {} domain(s) failed",
            report.label.name,
            report.filters_created(),
            report.filters_existing(),
            report.messages_modified(),
            report.failed_domains().len()
        );
        report
    }

    async fn reconcile_domain(
        &self,
        label_id: &str,
        raw: &str,
        domain: SenderDomain,
    ) -> DomainOutcome {
        let mut outcome = DomainOutcome::pending(raw, domain.clone());

        outcome.state = DomainState::CheckingExisting;
        match self.filters.ensure(&domain, label_id).await {
            Ok(filter) => {
                outcome.state = match filter {
                    FilterOutcome::Created(_) => DomainState::FilterCreated,
                    FilterOutcome::AlreadyExists(_) => DomainState::FilterExists,
                };
                outcome.filter = Some(filter);
            }
            Err(e) => {
                warn!("Filter step failed for {}: {}", domain, e);
                outcome.fail(&e);
                return outcome;
            }
        }

        outcome.state = DomainState::LabelingExistingMessages;
        match self.labeler.apply(label_id, &domain).await {
            Ok(report) => {
                outcome.labeling = Some(report);
                outcome.state = DomainState::Done;
            }
            Err(e) => {
                warn!("Could not search existing messages from {}: {}", domain, e);
                outcome.fail(&e);
            }
        }

        outcome
    }
}
