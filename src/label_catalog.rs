//! Label lookup, creation and deletion
use crate::client::MailboxService;
use crate::error::{Result, SyncError};
use crate::models::{Label, LabelResolution};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves label names to ids against the live label list.
///
/// Nothing is cached: every lookup enumerates labels again so that changes made
/// from other clients are picked up.
pub struct LabelCatalog {
    client: Arc<dyn MailboxService>,
}

impl LabelCatalog {
    pub fn new(client: Arc<dyn MailboxService>) -> Self {
        Self { client }
    }

    async fn user_labels(&self) -> Result<Vec<Label>> {
        let labels = self
            .client
            .list_labels()
            .await
            .map_err(|e| SyncError::LabelLookup(e.to_string()))?;

        Ok(labels.into_iter().filter(|l| !l.is_system()).collect())
    }

    /// Returns the id of the label named `name` (case-insensitive), creating it
    /// when no such label exists
    ///
    /// # Errors
    /// * `InvalidLabelName` for a blank name
    /// * `LabelLookup` when labels cannot be enumerated
    /// * the service error when creation fails
    pub async fn resolve_or_create(&self, name: &str) -> Result<LabelResolution> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::InvalidLabelName(
                "Label name cannot be empty".to_string(),
            ));
        }

        let labels = self.user_labels().await?;
        if let Some(existing) = labels
            .into_iter()
            .find(|l| l.name.to_lowercase() == name.to_lowercase())
        {
            info!("Label '{}' already exists", existing.name);
            return Ok(LabelResolution {
                id: existing.id,
                name: existing.name,
                created: false,
            });
        }

        info!("Creating label: {}", name);
        let created = self.client.create_label(name).await.map_err(|e| {
            warn!("Failed to create label '{}': {}", name, e);
            e
        })?;

        info!(
            "Successfully created label '{}' with ID: {}",
            created.name, created.id
        );
        Ok(LabelResolution {
            id: created.id,
            name: created.name,
            created: true,
        })
    }

    /// User label whose id matches exactly, or else whose name matches case-insensitively.
    ///
    /// Ids are unique, so an id never resolves to a label that merely has that name.
    pub async fn find(&self, name_or_id: &str) -> Result<Option<Label>> {
        let wanted = name_or_id.trim();
        if wanted.is_empty() {
            return Ok(None);
        }

        let labels = self.user_labels().await?;
        let by_id = labels.iter().position(|l| l.id == wanted);
        let index = by_id.or_else(|| {
            labels
                .iter()
                .position(|l| l.name.to_lowercase() == wanted.to_lowercase())
        });

        Ok(index.map(|i| labels[i].clone()))
    }

    /// User labels keyed by name. Failures are logged and yield an empty map.
    pub async fn list_user_labels(&self) -> BTreeMap<String, String> {
        match self.user_labels().await {
            Ok(labels) => {
                debug!("Found {} user labels", labels.len());
                labels.into_iter().map(|l| (l.name, l.id)).collect()
            }
            Err(e) => {
                warn!("An error occurred while fetching labels: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Deletes a label. Filters referencing it are left untouched.
    pub async fn delete(&self, label_id: &str) -> Result<()> {
        match self.client.delete_label(label_id).await {
            Ok(()) => {
                info!("Label {} successfully deleted", label_id);
                Ok(())
            }
            Err(e) => {
                warn!("An error occurred while deleting label {}: {}", label_id, e);
                Err(e)
            }
        }
    }
}
