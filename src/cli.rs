//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{MailboxService, ProductionGmailClient};
use crate::config::Config;
use crate::error::Result;
use crate::models::{DomainState, ExistingFilter, ReconciliationReport, SenderGroups};
use crate::orchestrator::ReconciliationOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "gmail-label-sync")]
#[command(version)]
#[command(
    about = "Keep Gmail labels, sender filters and existing messages in sync",
    long_about = None
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-label-sync/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Defaults to the interactive menu
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Interactive menu
    Menu,

    /// Show user labels and the sender domains seen under each
    Labels,

    /// List filters with the labels they apply
    Filters,

    /// Attach sender domains to an existing label (name or id)
    Attach {
        label: String,
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Create a label if needed and attach sender domains to it
    Create {
        label: String,
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Delete a filter by id
    DeleteFilter { id: String },

    /// Delete a label by id. Filters that reference it are kept.
    DeleteLabel { id: String },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Menu)
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share the MultiProgress that log output is routed through
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }

    /// Clear a spinner after a failed step
    pub fn fail_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✗ {}", msg));
    }

    pub fn println(&self, msg: impl AsRef<str>) {
        let _ = self.multi.println(msg.as_ref());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticate, build the Gmail client and wire up the orchestrator
pub async fn connect(
    cli: &Cli,
    config: &Config,
    reporter: &ProgressReporter,
) -> Result<ReconciliationOrchestrator> {
    if let Some(parent) = cli.token_cache.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let hub = match crate::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await {
        Ok(hub) => hub,
        Err(e) => {
            reporter.fail_spinner(&spinner, "Authentication failed");
            return Err(e);
        }
    };
    reporter.finish_spinner(&spinner, "Gmail API authenticated");

    let client: Arc<dyn MailboxService> =
        Arc::new(ProductionGmailClient::new(hub, &config.client));
    Ok(ReconciliationOrchestrator::new(client))
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!(
            "{}...",
            s.chars().take(max_len.saturating_sub(3)).collect::<String>()
        )
    }
}

/// Labels with their ids and the sender domains observed under each
pub fn format_sender_groups(labels: &BTreeMap<String, String>, groups: &SenderGroups) -> String {
    if labels.is_empty() {
        return "No user labels found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<32} {:<24} Senders", "Label", "ID");
    for (name, id) in labels {
        let senders = groups
            .get(name)
            .map(|set| {
                set.iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let senders = if senders.is_empty() {
            "-".to_string()
        } else {
            senders
        };
        let _ = writeln!(
            out,
            "{:<32} {:<24} {}",
            truncate_string(name, 32),
            id,
            truncate_string(&senders, 80)
        );
    }
    out
}

/// One filter as a single line: criterion, target labels, archive flag and id
pub fn format_filter_row(filter: &ExistingFilter, labels: &[String]) -> String {
    let criterion = filter
        .from
        .as_deref()
        .map(|from| format!("from:{}", from))
        .or_else(|| filter.query.clone())
        .unwrap_or_else(|| "<no criteria>".to_string());
    let target = if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    };
    let archive = if filter.remove_label_ids.iter().any(|id| id == "INBOX") {
        " (skip inbox)"
    } else {
        ""
    };
    format!("{} -> {}{} (ID: {})", criterion, target, archive, filter.id)
}

pub fn format_filters(filters: &[(ExistingFilter, Vec<String>)]) -> String {
    if filters.is_empty() {
        return "No filters found.\n".to_string();
    }

    let mut out = String::new();
    for (filter, labels) in filters {
        let _ = writeln!(out, "  - {}", format_filter_row(filter, labels));
    }
    out
}

pub fn format_report(report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n========================================");
    let _ = writeln!(
        out,
        "Label: {} ({}){}",
        report.label.name,
        report.label.id,
        if report.label.created { " [created]" } else { "" }
    );
    let _ = writeln!(out, "========================================");

    if report.domains.is_empty() {
        let _ = writeln!(out, "No domains given.");
    }
    for outcome in &report.domains {
        let marker = match outcome.state {
            DomainState::Failed => "✗",
            DomainState::Skipped => "-",
            _ => "✓",
        };
        let _ = writeln!(out, "  {} {}", marker, outcome.summary());
    }

    let _ = writeln!(out, "----------------------------------------");
    let _ = writeln!(out, "Filters created: {}", report.filters_created());
    let _ = writeln!(out, "Filters already present: {}", report.filters_existing());
    let _ = writeln!(out, "Messages labeled: {}", report.messages_modified());
    let skipped = report.skipped_domains();
    if !skipped.is_empty() {
        let _ = writeln!(out, "Domains skipped as duplicates: {}", skipped.len());
    }
    let failed = report.failed_domains();
    if !failed.is_empty() {
        let _ = writeln!(out, "Domains failed: {}", failed.len());
    }
    out
}
