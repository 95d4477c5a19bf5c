use anyhow::Result;
use clap::Parser;
use gmail_label_sync::cli::{self, Cli, Commands, ProgressReporter};
use gmail_label_sync::config::Config;
use gmail_label_sync::error::SyncError;
use gmail_label_sync::menu::Menu;
use gmail_label_sync::orchestrator::ReconciliationOrchestrator;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-label-sync --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick the provider explicitly.
    // aws-lc-rs everywhere except Windows, where ring avoids the NASM/CMake toolchain.
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_label_sync=debug,warn"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_label_sync=info,warn"))
    };

    // Logs print above spinners through the shared MultiProgress
    let multi_progress = Arc::new(MultiProgress::new());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: Arc::clone(&multi_progress),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let reporter = ProgressReporter::with_multi_progress((*multi_progress).clone());

    match cli.command() {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if force && gmail_label_sync::auth::clear_token_cache(&cli.token_cache).await? {
                tracing::info!("Removed existing token cache");
            }

            let hub = gmail_label_sync::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache)
                .await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            // Scope must be one of the granted ones or the flow starts again
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope("https://www.googleapis.com/auth/gmail.modify")
                .doit()
                .await
                .map_err(SyncError::from)?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(SyncError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;
            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - client.max_retries: retries for transient Gmail API errors");
            println!("  - client.request_timeout_secs: timeout per Gmail API call");
            println!("  - sender_groups.max_messages_per_label: messages sampled per label");
            Ok(())
        }

        Commands::Menu => {
            let (config, orchestrator) = open_session(&cli, &reporter).await?;
            Menu::new(&orchestrator, &config, &reporter).run().await?;
            Ok(())
        }

        Commands::Labels => {
            let (config, orchestrator) = open_session(&cli, &reporter).await?;
            let spinner = reporter.add_spinner("Collecting labels and senders...");
            let labels = orchestrator.labels().list_user_labels().await;
            let groups = orchestrator
                .sender_groups(config.sender_groups.max_messages_per_label)
                .await;
            reporter.finish_spinner(&spinner, &format!("Found {} labels", labels.len()));
            print!("{}", cli::format_sender_groups(&labels, &groups));
            Ok(())
        }

        Commands::Filters => {
            let (_, orchestrator) = open_session(&cli, &reporter).await?;
            let overview = orchestrator.filters_overview().await?;
            print!("{}", cli::format_filters(&overview));
            Ok(())
        }

        Commands::Attach { label, domains } => {
            let (_, orchestrator) = open_session(&cli, &reporter).await?;
            let report = orchestrator.attach_domains_to_label(&label, &domains).await?;
            print!("{}", cli::format_report(&report));
            Ok(())
        }

        Commands::Create { label, domains } => {
            let (_, orchestrator) = open_session(&cli, &reporter).await?;
            let report = orchestrator
                .create_label_with_domains(&label, &domains)
                .await?;
            print!("{}", cli::format_report(&report));
            Ok(())
        }

        Commands::DeleteFilter { id } => {
            let (_, orchestrator) = open_session(&cli, &reporter).await?;
            orchestrator.delete_filter(&id).await?;
            println!("Filter {} deleted", id);
            Ok(())
        }

        Commands::DeleteLabel { id } => {
            let (_, orchestrator) = open_session(&cli, &reporter).await?;
            orchestrator.delete_label(&id).await?;
            println!("Label {} deleted. Filters that applied it were kept.", id);
            Ok(())
        }
    }
}

async fn open_session(
    cli: &Cli,
    reporter: &ProgressReporter,
) -> Result<(Config, ReconciliationOrchestrator)> {
    let config = Config::load(&cli.config).await?;
    let orchestrator = cli::connect(cli, &config, reporter).await?;
    Ok((config, orchestrator))
}
