//! Gmail Label Sync
//!
//! Keeps a Gmail label taxonomy in sync with sender-based filters. Given a label
//! and a list of sender domains it makes sure the label exists, that exactly one
//! "label and skip the inbox" filter exists per domain, and that mail already in
//! the mailbox from those senders gets the label too.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_label_sync::{auth, client::ProductionGmailClient, config::Config};
//! use gmail_label_sync::{MailboxService, ReconciliationOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-label-sync/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let client: Arc<dyn MailboxService> =
//!         Arc::new(ProductionGmailClient::new(hub, &config.client));
//!     let orchestrator = ReconciliationOrchestrator::new(client);
//!
//!     let domains = vec!["shop.com".to_string(), "deals.example".to_string()];
//!     let report = orchestrator
//!         .create_label_with_domains("Shopping", &domains)
//!         .await?;
//!     println!("{} filters created", report.filters_created());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`client`] - `MailboxService` trait and the retrying Gmail API client
//! - [`label_catalog`] - Label lookup, creation and deletion
//! - [`filter_reconciler`] - Check-then-create for sender filters
//! - [`retro_labeler`] - Labeling of messages already in the mailbox
//! - [`sender_domain`] - Sender domain extraction from `From` headers
//! - [`orchestrator`] - Workflows composed from the components above
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`cli`] / [`menu`] - Command-line interface and interactive menu
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod filter_reconciler;
pub mod label_catalog;
pub mod menu;
pub mod models;
pub mod orchestrator;
pub mod retro_labeler;
pub mod sender_domain;

pub use error::{Result, SyncError};

pub use models::{
    DomainOutcome, DomainState, ExistingFilter, FilterOutcome, FilterSpec, Label,
    LabelResolution, LabelingReport, MessageHeaders, MessageRef, ReconciliationReport,
    SenderDomain, SenderGroups,
};

pub use config::{ClientConfig, Config, SenderGroupsConfig};

pub use client::{MailboxService, ProductionGmailClient};

pub use filter_reconciler::FilterReconciler;
pub use label_catalog::LabelCatalog;
pub use orchestrator::ReconciliationOrchestrator;
pub use retro_labeler::RetroactiveLabeler;
pub use sender_domain::SenderDomainExtractor;

pub use cli::{Cli, Commands, ProgressReporter};
