//! Interactive menu loop

use inquire::{Confirm, InquireError, Select, Text};
use std::fmt;

use crate::cli::{
    format_filter_row, format_filters, format_report, format_sender_groups, ProgressReporter,
};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::ExistingFilter;
use crate::orchestrator::ReconciliationOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ShowLabels,
    AttachDomains,
    DeleteFilter,
    DeleteLabel,
    CreateLabel,
    ListFilters,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 7] = [
        MenuAction::ShowLabels,
        MenuAction::AttachDomains,
        MenuAction::DeleteFilter,
        MenuAction::DeleteLabel,
        MenuAction::CreateLabel,
        MenuAction::ListFilters,
        MenuAction::Exit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MenuAction::ShowLabels => "Show labels and their senders",
            MenuAction::AttachDomains => "Add sender domains to an existing label",
            MenuAction::DeleteFilter => "Delete a filter",
            MenuAction::DeleteLabel => "Delete a label",
            MenuAction::CreateLabel => "Create a label with sender domains",
            MenuAction::ListFilters => "List filters",
            MenuAction::Exit => "Exit",
        };
        f.write_str(text)
    }
}

/// Selectable filter entry; the chosen value carries the filter itself
struct FilterChoice<'a> {
    filter: &'a ExistingFilter,
    row: String,
}

impl fmt::Display for FilterChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.row)
    }
}

fn filter_choices(overview: &[(ExistingFilter, Vec<String>)]) -> Vec<FilterChoice<'_>> {
    overview
        .iter()
        .map(|(filter, labels)| FilterChoice {
            filter,
            row: format_filter_row(filter, labels),
        })
        .collect()
}

/// Take entered lines up to the first blank line or `done`, trimmed
pub fn collect_domains<I>(lines: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| line.as_ref().trim().to_string())
        .take_while(|line| !line.is_empty() && !line.eq_ignore_ascii_case("done"))
        .collect()
}

fn is_cancel(error: &InquireError) -> bool {
    matches!(
        error,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

/// Prompt for domains one at a time until a blank entry or `done`
fn prompt_domains(label: &str) -> Result<Vec<String>> {
    println!(
        "Enter sender domains for '{}' one by one (example.com). Type 'done' or leave empty to finish:",
        label
    );

    let mut lines = Vec::new();
    loop {
        let line = Text::new(">").prompt()?;
        let finished = collect_domains([line.as_str()]).is_empty();
        if finished {
            break;
        }
        lines.push(line);
    }
    Ok(collect_domains(lines))
}

pub struct Menu<'a> {
    orchestrator: &'a ReconciliationOrchestrator,
    config: &'a Config,
    reporter: &'a ProgressReporter,
}

impl<'a> Menu<'a> {
    pub fn new(
        orchestrator: &'a ReconciliationOrchestrator,
        config: &'a Config,
        reporter: &'a ProgressReporter,
    ) -> Self {
        Self {
            orchestrator,
            config,
            reporter,
        }
    }

    /// Run until the user exits. Workflow failures are printed and the loop continues.
    pub async fn run(&self) -> Result<()> {
        loop {
            let action = match Select::new("What would you like to do?", MenuAction::ALL.to_vec())
                .with_page_size(MenuAction::ALL.len())
                .prompt()
            {
                Ok(action) => action,
                Err(e) if is_cancel(&e) => break,
                Err(e) => return Err(e.into()),
            };

            if action == MenuAction::Exit {
                break;
            }

            match self.dispatch(action).await {
                Ok(()) => {}
                Err(SyncError::PromptError(msg)) => {
                    tracing::debug!("Prompt cancelled: {}", msg);
                    println!("Cancelled.");
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        println!("Goodbye.");
        Ok(())
    }

    async fn dispatch(&self, action: MenuAction) -> Result<()> {
        match action {
            MenuAction::ShowLabels => self.show_labels().await,
            MenuAction::AttachDomains => self.attach_domains().await,
            MenuAction::DeleteFilter => self.delete_filter().await,
            MenuAction::DeleteLabel => self.delete_label().await,
            MenuAction::CreateLabel => self.create_label().await,
            MenuAction::ListFilters => self.list_filters().await,
            MenuAction::Exit => Ok(()),
        }
    }

    async fn show_labels(&self) -> Result<()> {
        let spinner = self.reporter.add_spinner("Collecting labels and senders...");
        let labels = self.orchestrator.labels().list_user_labels().await;
        let groups = self
            .orchestrator
            .sender_groups(self.config.sender_groups.max_messages_per_label)
            .await;
        self.reporter
            .finish_spinner(&spinner, &format!("Found {} labels", labels.len()));

        print!("{}", format_sender_groups(&labels, &groups));
        Ok(())
    }

    /// Pick one user label; `None` when there are none
    async fn select_label(&self, prompt: &str) -> Result<Option<(String, String)>> {
        let labels = self.orchestrator.labels().list_user_labels().await;
        if labels.is_empty() {
            println!("No user labels found.");
            return Ok(None);
        }

        let names: Vec<String> = labels.keys().cloned().collect();
        let name = Select::new(prompt, names).with_page_size(15).prompt()?;
        Ok(labels.get(&name).map(|id| (name, id.clone())))
    }

    async fn attach_domains(&self) -> Result<()> {
        let Some((name, id)) = self.select_label("Select label:").await? else {
            return Ok(());
        };

        let domains = prompt_domains(&name)?;
        if domains.is_empty() {
            println!("No domains entered.");
            return Ok(());
        }

        let report = self
            .orchestrator
            .attach_domains_to_label(&id, &domains)
            .await?;
        print!("{}", format_report(&report));
        Ok(())
    }

    async fn create_label(&self) -> Result<()> {
        let name = Text::new("New label name:").prompt()?;
        if name.trim().is_empty() {
            println!("No label name entered.");
            return Ok(());
        }

        let domains = prompt_domains(name.trim())?;
        let report = self
            .orchestrator
            .create_label_with_domains(&name, &domains)
            .await?;
        print!("{}", format_report(&report));
        Ok(())
    }

    async fn delete_label(&self) -> Result<()> {
        let Some((name, id)) = self.select_label("Select label to delete:").await? else {
            return Ok(());
        };

        let confirmed = Confirm::new(&format!("Delete label '{}' ({})?", name, id))
            .with_default(false)
            .with_help_message("Filters that apply this label are not deleted")
            .prompt()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }

        self.orchestrator.delete_label(&id).await?;
        println!("Label '{}' deleted.", name);
        Ok(())
    }

    async fn delete_filter(&self) -> Result<()> {
        let overview = self.orchestrator.filters_overview().await?;
        if overview.is_empty() {
            println!("No filters found.");
            return Ok(());
        }

        let choice = Select::new("Select filter to delete:", filter_choices(&overview))
            .with_page_size(15)
            .prompt()?;
        let filter_id = choice.filter.id.clone();

        let confirmed = Confirm::new(&format!("Delete filter {}?", filter_id))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }

        self.orchestrator.delete_filter(&filter_id).await?;
        println!("Filter {} deleted.", filter_id);
        Ok(())
    }

    async fn list_filters(&self) -> Result<()> {
        let overview = self.orchestrator.filters_overview().await?;
        print!("{}", format_filters(&overview));
        Ok(())
    }
}
