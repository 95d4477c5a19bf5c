//! Filter de-duplication and creation
use crate::client::MailboxService;
use crate::error::Result;
use crate::models::{ExistingFilter, FilterId, FilterOutcome, FilterSpec, SenderDomain};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps exactly one archive-to-label filter per (sender, label) pair
pub struct FilterReconciler {
    client: Arc<dyn MailboxService>,
}

impl FilterReconciler {
    pub fn new(client: Arc<dyn MailboxService>) -> Self {
        Self { client }
    }

    /// Id of a filter whose `from` criterion equals `domain` and whose actions
    /// add `label_id`
    pub async fn find_equivalent(
        &self,
        domain: &SenderDomain,
        label_id: &str,
    ) -> Result<Option<FilterId>> {
        let filters = self.client.list_filters().await?;
        debug!(
            "Checking {} existing filters for {} -> {}",
            filters.len(),
            domain,
            label_id
        );

        Ok(filters
            .into_iter()
            .find(|f| f.is_equivalent(domain, label_id))
            .map(|f| f.id))
    }

    /// Creates the filter for `domain` unless an equivalent one already exists.
    ///
    /// New filters add `label_id` and remove INBOX. The check and the create are
    /// not atomic: a filter created concurrently by another client between the two
    /// calls is not detected.
    pub async fn ensure(&self, domain: &SenderDomain, label_id: &str) -> Result<FilterOutcome> {
        let spec = FilterSpec::archive_to(domain.clone(), label_id)?;

        if let Some(existing) = self.find_equivalent(domain, label_id).await? {
            info!("Filter already exists for {} ({})", domain, existing);
            return Ok(FilterOutcome::AlreadyExists(existing));
        }

        let id = self.client.create_filter(&spec).await.map_err(|e| {
            warn!("An error occurred while creating filter for {}: {}", domain, e);
            e
        })?;

        info!("Filter created for {} ({})", domain, id);
        Ok(FilterOutcome::Created(id))
    }

    pub async fn delete(&self, filter_id: &str) -> Result<()> {
        match self.client.delete_filter(filter_id).await {
            Ok(()) => {
                info!("Filter {} deleted", filter_id);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "An error occurred while deleting filter {}: {}",
                    filter_id, e
                );
                Err(e)
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<ExistingFilter>> {
        self.client.list_filters().await
    }
}
